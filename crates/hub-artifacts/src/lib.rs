//! hub-artifacts: produce the artifact bundle a trained-model registry needs.
//!
//! Given a hub model id and a task type, a `ModelSource` writes three files
//! into an output directory:
//! - `traced_pytorch_model.pt` - the traced model, obtained through a `Tracer`
//! - `config.json` - the registry configuration derived from hub metadata
//! - `vocabulary.json` - the tokenizer vocabulary in registry format

pub mod derive;
pub mod download;
pub mod error;
pub mod source;
pub mod tracer;
pub mod vocab;

pub use download::{DEFAULT_HUB_URL, DEFAULT_REVISION, HubClient};
pub use error::AcquireError;
pub use source::{
    ArtifactBundle, CONFIG_FILE, HubModelSource, LocalArtifactSource, ModelSource, SOURCE_DIR,
    VOCABULARY_FILE,
};
pub use tracer::{CommandTracer, HubTracedFile, LocalTracedFile, TRACED_MODEL_FILE, Tracer};
