pub mod api;

pub use api::{
    ApiError, Client, ClientConfig, Context, EntityApi, EntityOperations, EntityRef,
    EntityRegistry, EntityType, PollConfig, QueryOptions, ResponseEnvelope, ResponseError,
    TaskPoller, TaskStatus,
};
