pub mod features;
pub mod intent;
pub mod result;
