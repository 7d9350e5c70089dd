//! Geography: pincode resolution, name normalization and the geographic
//! breakdowns shown on the dashboard map.

pub mod active;
pub mod aggregate;
pub mod normalize;
pub mod postal;

pub use active::*;
pub use aggregate::*;
pub use normalize::*;
pub use postal::*;
