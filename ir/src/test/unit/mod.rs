mod const_cast;
mod eval;
mod instruction;
