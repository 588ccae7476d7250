pub mod interlock;
