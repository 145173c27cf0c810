// Print-styled HTML reports. Open in a browser and print to PDF.

const PRINT_STYLE: &str = r#"
    @page { margin: 0.5in; size: A4; }
    @media print {
      body { margin: 0; }
      .no-print { display: none; }
      .page-break { page-break-before: always; }
    }
    body { font-family: Arial, sans-serif; margin: 0; padding: 20px; line-height: 1.4; color: #333; font-size: 12px; }
    .header { text-align: center; margin-bottom: 30px; background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 20px; border-radius: 8px; }
    .header h1 { margin: 0 0 10px 0; font-size: 24px; }
    .header p { margin: 4px 0; }
    .no-print { background: #fef3c7; border: 1px solid #f59e0b; padding: 10px; margin-bottom: 20px; border-radius: 6px; }
    .summary { display: grid; grid-template-columns: repeat(4, 1fr); gap: 15px; margin: 20px 0; }
    .summary-card { text-align: center; padding: 15px; border: 2px solid #e5e7eb; border-radius: 8px; background: #f8fafc; }
    .summary-card h3 { margin: 0 0 5px 0; font-size: 20px; color: #1e40af; }
    .summary-card p { margin: 0; color: #64748b; }
    .section-title { font-size: 16px; font-weight: bold; color: #1e40af; border-bottom: 2px solid #3b82f6; padding-bottom: 6px; margin: 25px 0 10px 0; }
    .event-section { margin: 20px 0; border: 1px solid #e2e8f0; border-radius: 8px; padding: 10px; }
    .event-header h3 { margin: 0; }
    .no-data { text-align: center; color: #94a3b8; padding: 15px; font-style: italic; }
    table { width: 100%; border-collapse: collapse; margin: 15px 0; font-size: 10px; }
    th, td { border: 1px solid #e2e8f0; padding: 6px 4px; text-align: left; }
    th { background: #3b82f6; color: white; font-weight: 600; }
    tr:nth-child(even) { background-color: #f8fafc; }
    .footer { margin-top: 30px; text-align: center; font-size: 10px; color: #64748b; border-top: 2px solid #e2e8f0; padding-top: 15px; }
"#;

/// Escape text for use in element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Builds one self-contained HTML page. Every text argument is escaped.
#[derive(Debug, Clone)]
pub struct HtmlReport {
    body: String,
    title: String,
}

impl HtmlReport {
    pub fn new(title: &str) -> Self {
        HtmlReport {
            body: String::new(),
            title: title.to_string(),
        }
    }

    /// Banner reminding the reader how to save the page as a PDF.
    pub fn print_instructions(mut self) -> Self {
        self.body.push_str(
            "<div class=\"no-print\"><strong>Instructions:</strong> Use your browser's print \
             function (Ctrl+P or Cmd+P) and select \"Save as PDF\" to download this report.</div>\n",
        );
        self
    }

    /// The coloured header: a heading plus `label: value` lines.
    pub fn header(mut self, heading: &str, lines: &[(&str, String)]) -> Self {
        self.body.push_str("<div class=\"header\">\n");
        self.body
            .push_str(&format!("<h1>{}</h1>\n", escape(heading)));
        for (label, value) in lines {
            self.body.push_str(&format!(
                "<p><strong>{}:</strong> {}</p>\n",
                escape(label),
                escape(value)
            ));
        }
        self.body.push_str("</div>\n");
        self
    }

    /// A row of headline numbers.
    pub fn summary(mut self, cards: &[(String, &str)]) -> Self {
        self.body.push_str("<div class=\"summary\">\n");
        for (value, label) in cards {
            self.body.push_str(&format!(
                "<div class=\"summary-card\"><h3>{}</h3><p>{}</p></div>\n",
                escape(value),
                escape(label)
            ));
        }
        self.body.push_str("</div>\n");
        self
    }

    pub fn section(mut self, title: &str) -> Self {
        self.body
            .push_str(&format!("<div class=\"section-title\">{}</div>\n", escape(title)));
        self
    }

    pub fn page_break(mut self) -> Self {
        self.body.push_str("<div class=\"page-break\"></div>\n");
        self
    }

    /// A bordered block with a heading and detail lines, closed by [`HtmlReport::end_block`].
    pub fn begin_block(mut self, heading: &str, lines: &[String]) -> Self {
        self.body
            .push_str("<div class=\"event-section\">\n<div class=\"event-header\">\n");
        self.body
            .push_str(&format!("<h3>{}</h3>\n", escape(heading)));
        for line in lines {
            self.body.push_str(&format!("<p>{}</p>\n", escape(line)));
        }
        self.body.push_str("</div>\n");
        self
    }

    pub fn end_block(mut self) -> Self {
        self.body.push_str("</div>\n");
        self
    }

    pub fn no_data(mut self, message: &str) -> Self {
        self.body
            .push_str(&format!("<div class=\"no-data\">{}</div>\n", escape(message)));
        self
    }

    pub fn table<R, C>(mut self, headers: &[&str], rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = String>,
    {
        self.body.push_str("<table>\n<thead><tr>");
        for h in headers {
            self.body.push_str(&format!("<th>{}</th>", escape(h)));
        }
        self.body.push_str("</tr></thead>\n<tbody>\n");
        for row in rows {
            self.body.push_str("<tr>");
            for cell in row {
                self.body.push_str(&format!("<td>{}</td>", escape(&cell)));
            }
            self.body.push_str("</tr>\n");
        }
        self.body.push_str("</tbody>\n</table>\n");
        self
    }

    pub fn finish(mut self, footer: &str, generated_at: &str) -> String {
        self.body.push_str(&format!(
            "<div class=\"footer\"><p><strong>{}</strong></p><p>Timestamp: {}</p></div>\n",
            escape(footer),
            escape(generated_at)
        ));
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
            escape(&self.title),
            PRINT_STYLE,
            self.body
        )
    }
}

/// Page shown instead of a report when there is nothing to list.
pub fn empty_page(message: &str) -> String {
    format!(
        "<html><body><h1>{}</h1></body></html>",
        escape(message)
    )
}
