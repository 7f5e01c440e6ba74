mod analysis;
mod simulate;
