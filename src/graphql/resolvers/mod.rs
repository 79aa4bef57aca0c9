pub mod mutation;
pub mod query;
pub mod subscription;

pub use mutation::Mutation;
pub use query::Query;
pub use subscription::Subscription;
