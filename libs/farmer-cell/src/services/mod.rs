pub mod farmer;

pub use farmer::FarmerService;
