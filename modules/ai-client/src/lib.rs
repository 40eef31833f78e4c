pub mod claude;
pub mod schema;
pub(crate) mod types;
pub mod util;

pub use claude::Claude;
pub use schema::StructuredOutput;
