pub mod open_first_cycle;

pub use open_first_cycle::OpenFirstCycle;
