//! The request pipeline: unit traits, registry, resolution and execution.

pub mod executor;
pub mod registry;
pub mod resolver;
pub mod unit;

pub use executor::{INSTANCE_HEADER, PipelineExecutor};
pub use registry::{PipelineRegistry, PipelineRegistryBuilder};
pub use resolver::ResolveError;
pub use unit::{
    GlobalChecker, HandlerError, PipelineUnit, RequestInterceptor, ResponseInterceptor, Service,
    UnitDescriptor,
};
