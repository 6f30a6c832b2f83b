pub mod issuance;
pub mod number;

pub use issuance::{PrescriptionService, Viewer};
pub use number::{generate_prescription_no, is_well_formed, PrescriptionRef};
