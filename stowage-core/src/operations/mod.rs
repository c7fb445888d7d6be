mod put_object;
mod read_object;

pub use put_object::{PutObjectOperation, PutObjectOperationRequest, PutObjectOperationResult};
pub use read_object::{
    ReadObjectOperation, ReadObjectOperationOutcome, ReadObjectOperationRequest,
    ReadObjectOperationResult,
};
