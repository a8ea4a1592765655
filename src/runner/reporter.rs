use crate::http::Response;
use crate::parser::ScriptPhase;
use crate::runner::types::{ScriptReport, TestResult, TestSummary};
use colored::Colorize;

pub struct TestReporter {
    verbose: bool,
}

impl TestReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// 打印单个测试结果
    pub fn print_result(&self, result: &TestResult) {
        let name_part = match &result.name {
            Some(name) => format!(" {} -", name),
            None => String::new(),
        };

        if result.skipped {
            println!(
                " {} [{}]{} {}",
                "⊘".dimmed(),
                result.request_number,
                name_part,
                "(no request line)".dimmed()
            );
            return;
        }

        let symbol = if result.success {
            "✓".green()
        } else {
            "✗".red()
        };

        println!(
            " {} [{}]{} {} {} ({}ms)",
            symbol,
            result.request_number,
            name_part,
            result.method.cyan(),
            result.url,
            result.duration.as_millis()
        );

        // verbose 模式或失败时显示响应
        if let Some(response) = &result.response {
            if self.verbose || !result.success {
                for line in format_response(response, self.verbose).lines() {
                    println!("   {}", line);
                }
                println!();
            }
        }

        if let Some(error) = &result.error {
            println!("   {}: {}", "Error".red().bold(), error);
            println!();
        }

        if !result.assertions.is_empty() {
            println!("   Assertions:");
            for assertion in &result.assertions {
                if assertion.passed {
                    println!("     {} {}", "✓".green(), assertion.raw);
                } else {
                    println!("     {} {}", "✗".red(), assertion.raw);
                    if let Some(msg) = &assertion.message {
                        println!("       {}", msg.red());
                    }
                }
            }
            println!();
        }

        for report in &result.scripts {
            self.print_script(report);
        }
    }

    fn print_script(&self, report: &ScriptReport) {
        let label = match report.phase {
            ScriptPhase::PreRequest => "Pre-request script",
            ScriptPhase::PostResponse => "Response script",
        };
        let result = &report.result;

        if !result.success {
            println!(
                "   {} {}: {}",
                "✗".red(),
                label,
                result.failure.as_deref().unwrap_or("failed").red()
            );
        } else if self.verbose || !result.tests.is_empty() {
            println!("   {}:", label);
        }

        if self.verbose {
            for log in &result.logs {
                println!("     {} {}", "›".dimmed(), log);
            }
        }

        for test in &result.tests {
            if test.passed {
                println!("     {} {}", "✓".green(), test.name);
            } else {
                println!("     {} {}", "✗".red(), test.name);
                if let Some(detail) = &test.detail {
                    println!("       {}", detail.red());
                }
            }
        }
    }

    /// 打印测试开始
    pub fn print_header(&self, file_path: &str, total: usize) {
        println!(
            "\nRunning {} requests from {}...\n",
            total,
            file_path.bold()
        );
    }

    /// 打印测试摘要
    pub fn print_summary(&self, summary: &TestSummary) {
        println!("\n{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));

        if summary.skipped > 0 {
            println!(
                "  {}: {} passed, {} failed, {} skipped, {} total",
                "Requests".bold(),
                summary.passed.to_string().green(),
                summary.failed.to_string().red(),
                summary.skipped.to_string().dimmed(),
                summary.total
            );
        } else {
            println!(
                "  {}: {} passed, {} failed, {} total",
                "Requests".bold(),
                summary.passed.to_string().green(),
                summary.failed.to_string().red(),
                summary.total
            );
        }

        if summary.total_assertions > 0 {
            println!(
                "  {}: {} passed, {} failed, {} total",
                "Assertions".bold(),
                summary.passed_assertions.to_string().green(),
                summary.failed_assertions.to_string().red(),
                summary.total_assertions
            );
        }

        if summary.total_script_tests > 0 {
            println!(
                "  {}: {} passed, {} failed, {} total",
                "Script tests".bold(),
                (summary.total_script_tests - summary.failed_script_tests)
                    .to_string()
                    .green(),
                summary.failed_script_tests.to_string().red(),
                summary.total_script_tests
            );
        }

        println!(
            "  {}: {:.3}s",
            "Duration".bold(),
            summary.total_duration.as_secs_f64()
        );
        println!();
    }
}

impl Default for TestReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

/// 响应的文本形式：状态行，verbose 时带 header，JSON 体美化输出
fn format_response(response: &Response, with_headers: bool) -> String {
    let mut output = format!(
        "HTTP {} {}\n",
        response.status.code(),
        response.status_text
    );

    if with_headers {
        for (key, value) in &response.headers {
            output.push_str(&format!("{}: {}\n", key.dimmed(), value));
        }
    }

    if !response.body.is_empty() {
        output.push('\n');
        match serde_json::from_str::<serde_json::Value>(&response.body) {
            Ok(json) => match serde_json::to_string_pretty(&json) {
                Ok(pretty) => output.push_str(&pretty),
                Err(_) => output.push_str(&response.body),
            },
            Err(_) => output.push_str(&response.body),
        }
    }

    output
}
