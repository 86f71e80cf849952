pub mod presenter;
pub mod registry;
pub mod session;
pub mod training;
pub mod wizard;

pub use registry::{FieldKind, FieldSpec, FormValues};
pub use session::{DiagnosisSession, SessionOptions, SessionSnapshot, SubmitError};
pub use training::{ModelHandle, Predictor, ProgressReporter, Trainer, TrainingCoordinator};
pub use wizard::{WizardError, WizardEvent, WizardState};
