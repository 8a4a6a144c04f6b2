pub mod metadata;
pub mod recommendation;

pub use metadata::MetadataClient;
pub use recommendation::{
    FeatureVectorCodec, RecommendationRequest, RecommendationService, Recommendations,
};
