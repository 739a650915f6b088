pub mod form_contract;
pub mod loaders;
pub mod outcome;
pub mod record;

pub use form_contract::{FieldStep, FormContract, InputAction, LocatorStrategy};
pub use loaders::{load_records, select_range, RecordDefaults};
pub use outcome::{
    BatchReport, DiagnosticEvent, RecordOutcome, RecordState, RecordStatus, RetryBudget,
    SubmissionOutcome,
};
pub use record::Record;
