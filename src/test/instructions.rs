mod alu;
mod compare;
mod control;
mod externals;
mod indirect;
mod locals;
mod moves;
mod stack;
mod traps;
mod unary;
