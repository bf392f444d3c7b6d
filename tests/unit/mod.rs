mod anchoring_tests;
mod rendering_tests;
mod usecase_tests;
