pub mod frame_sampler;
pub mod similarity_scorer;
