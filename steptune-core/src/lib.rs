//! ABOUTME: Core traits, types, and infrastructure for steptune
//! ABOUTME: Foundation layer providing the Sampler/FunctionInvoker seams and error handling

pub mod error;
pub mod types;

pub mod traits {
    pub mod invoker;
    pub mod sampler;
}

// Re-export commonly used types
pub use error::{Result, StepTuneError};
pub use traits::{
    invoker::FunctionInvoker,
    sampler::{Sampler, SamplerProvider},
};
pub use types::{ParamCurve, PayloadFit, WeightedPayload};
