pub mod ssim_scorer;
