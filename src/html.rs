use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::chart::ChartSpec;

pub const DEFAULT_TITLE: &str = "Fantasy EPL Dashboard";
const SLATE_CSS: &str = "https://cdn.jsdelivr.net/npm/bootswatch@5/dist/slate/bootstrap.min.css";
const VEGA_JS: &str = "https://cdn.jsdelivr.net/npm/vega@5";
const VEGA_LITE_JS: &str = "https://cdn.jsdelivr.net/npm/vega-lite@5";
const VEGA_EMBED_JS: &str = "https://cdn.jsdelivr.net/npm/vega-embed@6";

/// Standalone page embedding `spec`; chart sizes follow the browser window.
pub fn render_page(spec: &ChartSpec, title: &str) -> Result<String> {
    let json = serde_json::to_string(&spec.to_vega_lite()).context("serialize chart spec")?;
    // Keep the inline script from being closed by data.
    let json = json.replace("</", "<\\/");
    let title = escape_html(title);
    Ok(format!(
        r##"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <link rel="stylesheet" href="{SLATE_CSS}">
  <script src="{VEGA_JS}"></script>
  <script src="{VEGA_LITE_JS}"></script>
  <script src="{VEGA_EMBED_JS}"></script>
</head>
<body>
  <div id="vis"></div>
  <script type="text/javascript">
    const spec = {json};
    spec.vconcat[0].spec.width = 0.215 * window.innerWidth;
    spec.vconcat[0].spec.height = 0.4 * window.innerHeight;
    spec.vconcat[1].width = 0.9 * window.innerWidth;
    spec.vconcat[1].height = 0.4 * window.innerHeight;
    vegaEmbed("#vis", spec, {{ actions: false }}).catch(console.error);
  </script>
</body>
</html>
"##
    ))
}

pub fn write_page(path: &Path, spec: &ChartSpec, title: &str) -> Result<()> {
    let page = render_page(spec, title)?;
    fs::write(path, page).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{Aggregation, Dimensions, build};
    use crate::model::{Dataset, Statistic};

    #[test]
    fn page_has_title_theme_and_spec() {
        let spec = build(
            &Dataset::default(),
            Dimensions::default(),
            Statistic::TotalPoints,
            Aggregation::Weekly,
            None,
        );
        let page = render_page(&spec, "Stats & <More>").expect("render");
        assert!(page.contains("<title>Stats &amp; &lt;More&gt;</title>"));
        assert!(page.contains(SLATE_CSS));
        assert!(page.contains("vega-lite/v5.json"));
        assert!(page.contains("0.215 * window.innerWidth"));
        assert!(page.contains(r##"vegaEmbed("#vis", spec, { actions: false })"##));
        assert!(page.trim_end().ends_with("</html>"));
    }
}
