//! # Reporting Module / 报告模块
//!
//! This module handles result presentation: colored console summaries for
//! single test runs and whole evaluations, and an HTML rendering of the
//! evaluation report.
//!
//! 此模块处理结果展示：单次测试运行和整体评估的彩色控制台摘要，
//! 以及评估报告的 HTML 渲染。

pub mod console;
pub mod html;

pub use self::console::{print_evaluation_summary, print_job_error, print_test_result};
pub use self::html::generate_html_report;
