pub mod config;
pub mod lemma;
pub mod normalize;
pub mod note;
pub mod schema;
pub mod stopwords;

pub use config::{
    ClassifierConfig, ClassifierStrategy, Settings, StoreBackend, StoreConfig,
};
pub use lemma::Lemmatizer;
pub use normalize::{Normalizer, normalize};
pub use note::{Note, PredictionResult, notes_from_batches};
pub use schema::SchemaError;
