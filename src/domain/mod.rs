pub mod charger;
pub mod forecast;
pub mod plan;
pub mod session;
pub mod vehicle;

pub use charger::*;
pub use forecast::*;
pub use plan::*;
pub use session::*;
pub use vehicle::*;
