pub mod error;
pub mod operation;
pub mod params;
pub mod result;
pub mod terms;

pub use error::{EngineError, Result};
pub use operation::OperationId;
pub use params::{
    DatasetDescriptor, OperationParams, RelationshipColumns, RelationshipDescriptor,
};
pub use result::OperationResult;
pub use terms::{
    HierarchyLevel, MedDraDictionary, MedDraTerm, TermDictionary, WhoDrugDictionary,
    WhoDrugRecord, WhoDrugRecordKind,
};
