/*
 *     Copyright 2025 The Netpulse Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use super::{ReportContent, ReportFormat, ReportLine, ReportRenderer};
use netpulse_core::Result;

/// RULE_WIDTH is the width of the rule framing the title.
const RULE_WIDTH: usize = 52;

/// TextRenderer renders reports as plain UTF-8 text. It is always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl ReportRenderer for TextRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Text
    }

    fn render(&self, content: &ReportContent) -> Result<Vec<u8>> {
        let rule = "=".repeat(RULE_WIDTH);
        let mut out = String::new();
        for line in content.lines() {
            match line {
                ReportLine::Title(title) => {
                    out.push_str(&rule);
                    out.push('\n');
                    out.push_str(&format!("{:^width$}", title.to_uppercase(), width = RULE_WIDTH));
                    out.push('\n');
                    out.push_str(&rule);
                    out.push('\n');
                }
                ReportLine::Heading(heading) => {
                    out.push_str(&heading.to_uppercase());
                    out.push('\n');
                    out.push_str(&"-".repeat(heading.chars().count()));
                    out.push('\n');
                }
                ReportLine::Text(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
                ReportLine::Blank => out.push('\n'),
            }
        }

        Ok(out.into_bytes())
    }
}
