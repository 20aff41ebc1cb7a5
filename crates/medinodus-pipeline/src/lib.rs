//! # MediNodus分析流水线
//!
//! 图片 → 文字提取 → 清洗/解析 → 药品说明书查询 → 综合分析 → 写入病史。
//!
//! 各阶段的外部协作方都以trait注入，进程启动时创建一次。

pub mod engine;
pub mod extraction;
pub mod lookup;
pub mod normalizer;
pub mod parser;
pub mod synthesis;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use engine::{AnalysisOutcome, AnalysisPipeline};
pub use extraction::{TextExtractor, VisionExtractor};
pub use lookup::{DrugLookup, OpenFdaLookup};
pub use normalizer::normalize;
pub use parser::{parse, ParseOutcome, RAW_OUTPUT_LIMIT};
pub use synthesis::{ExtractedFields, LlmSynthesizer, NarrativeSynthesizer, PatientContext, SynthesisRequest};
