pub mod variable;
pub mod result;
pub mod preset;
pub mod settings;
pub mod errors;

pub use variable::*;
pub use result::*;
pub use preset::*;
pub use settings::*;
pub use errors::*;
