pub mod test_feature_pipeline;
