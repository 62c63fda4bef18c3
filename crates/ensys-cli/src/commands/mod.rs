pub mod lp;
pub mod run;
pub mod show;
pub mod solvers;
