// src/report/xml.rs

use super::{ReportHeader, ReportSink, StreamHeader};
use crate::aggregate::{MetricSample, RunSummary};
use crate::error::Result;
use crate::metrics::ChannelSsim;
use std::borrow::Cow;
use std::io::Write;

/// `<resultset>` document with one `<frame count='n'>` element per sample.
pub struct XmlReport<W: Write> {
    out: W,
}

impl<W: Write> XmlReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn stream(&mut self, tag: &str, stream: &StreamHeader) -> Result<()> {
        writeln!(self.out, "  <{}>", tag)?;
        writeln!(self.out, "    <filename>{}</filename>", escape(&stream.file))?;
        writeln!(self.out, "    <dimensions>{}</dimensions>", escape(&stream.dimensions))?;
        writeln!(self.out, "    <numframes>{}</numframes>", stream.numframes)?;
        writeln!(self.out, "    <codec>{}</codec>", escape(&stream.codec))?;
        writeln!(self.out, "  </{}>", tag)?;
        Ok(())
    }

    fn mssim(&mut self, tag: &str, indent: &str, ssim: &ChannelSsim) -> Result<()> {
        writeln!(
            self.out,
            "{indent}<{tag} R='{:.2}' G='{:.2}' B='{:.2}'/>",
            ssim.r, ssim.g, ssim.b
        )?;
        Ok(())
    }
}

impl<W: Write> ReportSink for XmlReport<W> {
    fn begin(&mut self, header: &ReportHeader) -> Result<()> {
        writeln!(self.out, "<?xml version='1.0' encoding='UTF-8'?>")?;
        writeln!(self.out, "<resultset>")?;
        self.stream("reference", &header.reference)?;
        self.stream("test", &header.test)?;
        writeln!(
            self.out,
            "  <testsPerformed>{}</testsPerformed>",
            escape(&header.tests_performed)
        )?;
        writeln!(self.out, "  <results>")?;
        Ok(())
    }

    fn frame(&mut self, sample: &MetricSample) -> Result<()> {
        writeln!(self.out, "    <frame count='{}'>", sample.frame)?;
        writeln!(self.out, "      <psnr>{:.6}</psnr>", sample.psnr)?;
        writeln!(self.out, "      <rmse>{:.6}</rmse>", sample.rmse)?;
        writeln!(self.out, "      <tmsec>{:.6}</tmsec>", sample.test_millis)?;
        writeln!(self.out, "      <smsec>{:.6}</smsec>", sample.reference_millis)?;
        if let Some(ssim) = &sample.ssim {
            self.mssim("mssim", "      ", ssim)?;
        }
        writeln!(self.out, "    </frame>")?;
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<()> {
        writeln!(self.out, "    <framecount>{}</framecount>", summary.sample_count)?;
        writeln!(self.out, "    <lastframe>{}</lastframe>", summary.last_frame)?;
        writeln!(self.out, "    <averagepsnr>{:.6}</averagepsnr>", summary.average_psnr)?;
        writeln!(self.out, "    <averagermse>{:.6}</averagermse>", summary.average_rmse)?;
        if let Some(ssim) = &summary.average_ssim {
            self.mssim("averagemssim", "    ", ssim)?;
        }
        writeln!(self.out, "  </results>")?;
        writeln!(self.out, "</resultset>")?;
        self.out.flush()?;
        Ok(())
    }
}

fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '\'', '"']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::testing;

    fn render(with_ssim: bool) -> String {
        let ssim = with_ssim.then_some(ChannelSsim { r: 99.5, g: 98.0, b: 97.25 });
        let mut report = XmlReport::new(Vec::new());
        report.begin(&testing::header(with_ssim)).unwrap();
        report.frame(&testing::sample(0, ssim)).unwrap();
        report.frame(&testing::sample(3, ssim)).unwrap();
        report.finish(&testing::summary(ssim)).unwrap();
        String::from_utf8(report.into_inner()).unwrap()
    }

    #[test]
    fn document_is_balanced() {
        let doc = render(false);
        assert!(doc.contains("<filename>ref.y4m</filename>"));
        assert!(doc.contains("<frame count='3'>"));
        assert!(doc.contains("<psnr>35.500000</psnr>"));
        assert!(doc.contains("<averagermse>4.250000</averagermse>"));
        assert!(doc.contains("<framecount>2</framecount>"));
        for tag in ["resultset", "reference", "test", "results", "frame"] {
            let opened = doc.matches(&format!("<{}>", tag)).count()
                + doc.matches(&format!("<{} ", tag)).count();
            let closed = doc.matches(&format!("</{}>", tag)).count();
            assert_eq!(opened, closed, "unbalanced <{}>", tag);
        }
        assert!(!doc.contains("mssim"));
    }

    #[test]
    fn ssim_attributes_are_written() {
        let doc = render(true);
        assert!(doc.contains("<mssim R='99.50' G='98.00' B='97.25'/>"));
        assert!(doc.contains("<averagemssim R='99.50'"));
    }

    #[test]
    fn escapes_markup_in_file_names() {
        assert_eq!(escape("a&b<c>.mp4"), "a&amp;b&lt;c&gt;.mp4");
        assert!(matches!(escape("plain.mp4"), Cow::Borrowed(_)));
    }
}
