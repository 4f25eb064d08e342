//! High-level composite handlers (§4.5): multi-step idioms for the
//! overlay/grid/date-picker widgets that show up across generated
//! scenarios, built out of the same `Frame`/`Locator` primitives the
//! simpler handlers use.

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::{Locator, Page, WaitState};
use crate::registry::{StepContext, StepHandler, StepRegistry};
use crate::schema::Selector;

use super::{deserialize_params, timeout_or, DEFAULT_WAIT_TIMEOUT};

pub fn register(registry: &mut StepRegistry) {
    registry.register("select_overlay_option", Box::new(SelectOverlayOption));
    registry.register("select_wijmo_combo", Box::new(SelectWijmoCombo));
    registry.register("click_wijmo_grid_cell", Box::new(ClickWijmoGridCell));
    registry.register("set_date_picker", Box::new(SetDatePicker));
    registry.register("upload_file", Box::new(UploadFile));
    registry.register("wait_for_toast", Box::new(WaitForToast));
    registry.register("assert_no_console_error", Box::new(AssertNoConsoleError));
}

#[derive(Debug, Deserialize)]
struct SelectOverlayOptionParams {
    open: Selector,
    list: Selector,
    option_text: String,
}

/// Clicks the opener, waits for the list to become visible, then clicks the
/// single option within that list whose visible text matches `option_text`.
/// Uniqueness is required — zero or more than one match is an error.
struct SelectOverlayOption;
#[async_trait]
impl StepHandler for SelectOverlayOption {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: SelectOverlayOptionParams = deserialize_params(params)?;
        ctx.resolve(page, &p.open).await?.click().await?;
        let list = ctx.resolve(page, &p.list).await?;
        list.wait_for(WaitState::Visible, DEFAULT_WAIT_TIMEOUT).await?;
        let option_text = ctx.expander.expand(&p.option_text)?;
        click_unique_text_match(list.as_ref(), &option_text).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["open", "list", "option_text"]})
    }
}

#[derive(Debug, Deserialize)]
struct SelectWijmoComboParams {
    root: Selector,
    option_text: String,
}

/// Opens a Wijmo combo by clicking its root, waits for its dropdown to
/// become visible (the open animation is asynchronous), then picks the
/// option matching `option_text` scoped to that dropdown — a page-wide text
/// search would risk matching the same label elsewhere on the page.
struct SelectWijmoCombo;
#[async_trait]
impl StepHandler for SelectWijmoCombo {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: SelectWijmoComboParams = deserialize_params(params)?;
        ctx.resolve(page, &p.root).await?.click().await?;
        let dropdown = page.by_css(".wj-listbox.wj-content:visible", None);
        dropdown.wait_for(WaitState::Visible, DEFAULT_WAIT_TIMEOUT).await?;
        let option_text = ctx.expander.expand(&p.option_text)?;
        click_unique_text_match(dropdown.as_ref(), &option_text).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["root", "option_text"]})
    }
}

async fn click_unique_text_match(scope: &dyn Locator, text: &str) -> anyhow::Result<()> {
    let option = scope.by_text(text).await?;
    let count = option.count().await?;
    if count == 0 {
        anyhow::bail!("no option matching text '{text}'");
    }
    if count > 1 {
        anyhow::bail!("ambiguous option text '{text}' matched {count} elements");
    }
    option.click().await
}

const GRID_SCROLL_CAP: u32 = 50;

#[derive(Debug, Deserialize)]
struct ClickWijmoGridCellParams {
    grid: String,
    row_key: String,
    column: String,
}

/// Virtual-scroll grid cell click (§4.5): resolves the target column by
/// reading header cells, then scans visible body rows for `row_key`,
/// scrolling the grid body by one viewport height and retrying when the row
/// isn't currently rendered. Bounded to `GRID_SCROLL_CAP` attempts.
struct ClickWijmoGridCell;
#[async_trait]
impl StepHandler for ClickWijmoGridCell {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: ClickWijmoGridCellParams = deserialize_params(params)?;
        let grid = ctx.expander.expand(&p.grid)?;
        let row_key = ctx.expander.expand(&p.row_key)?;

        let header_cells = page.by_css(&format!("{grid} thead th"), None);
        let header_count = header_cells.count().await?;
        let mut column_index = None;
        for i in 1..=header_count {
            let cell = page.by_css(&format!("{grid} thead th:nth-child({i})"), None);
            if cell.text_content().await? == p.column {
                column_index = Some(i);
                break;
            }
        }
        let column_index = column_index.ok_or_else(|| anyhow::anyhow!("column '{}' not found in grid '{grid}'", p.column))?;

        for _attempt in 0..GRID_SCROLL_CAP {
            let rows = page.by_css(&format!("{grid} tbody tr"), None);
            let row_count = rows.count().await?;
            for r in 1..=row_count {
                let key_cell = page.by_css(&format!("{grid} tbody tr:nth-child({r}) td:nth-child(1)"), None);
                if key_cell.text_content().await? == row_key {
                    let target = page.by_css(&format!("{grid} tbody tr:nth-child({r}) td:nth-child({column_index})"), None);
                    return target.click().await;
                }
            }
            let body = page.by_css(&format!("{grid} tbody"), None);
            let viewport_height = body.container_client_height().await?;
            body.scroll_container_by(0, viewport_height as i64).await?;
        }
        anyhow::bail!("row '{row_key}' not found in grid '{grid}' after {GRID_SCROLL_CAP} scroll attempts")
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["grid", "row_key", "column"]})
    }
}

#[derive(Debug, Deserialize)]
struct SetDatePickerParams {
    by: Selector,
    date: String,
    #[serde(default)]
    format: Option<String>,
}

struct SetDatePicker;
#[async_trait]
impl StepHandler for SetDatePicker {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: SetDatePickerParams = deserialize_params(params)?;
        let date = ctx.expander.expand(&p.date)?;
        let value = match &p.format {
            Some(format) => {
                let parsed = chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|e| anyhow::anyhow!("date '{date}' is not in YYYY-MM-DD form: {e}"))?;
                parsed.format(format).to_string()
            }
            None => date,
        };
        ctx.resolve(page, &p.by).await?.fill(&value).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by", "date"]})
    }
}

#[derive(Debug, Deserialize)]
struct UploadFileParams {
    by: Selector,
    file_path: String,
}

struct UploadFile;
#[async_trait]
impl StepHandler for UploadFile {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: UploadFileParams = deserialize_params(params)?;
        let path = ctx.expander.expand(&p.file_path)?;
        ctx.resolve(page, &p.by).await?.set_input_files(&path).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by", "file_path"]})
    }
}

#[derive(Debug, Deserialize)]
struct WaitForToastParams {
    text: String,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

struct WaitForToast;
#[async_trait]
impl StepHandler for WaitForToast {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: WaitForToastParams = deserialize_params(params)?;
        let text = ctx.expander.expand(&p.text)?;
        page.by_text(&text).wait_for(WaitState::Visible, timeout_or(p.timeout_ms, DEFAULT_WAIT_TIMEOUT)).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["text"]})
    }
}

struct AssertNoConsoleError;
#[async_trait]
impl StepHandler for AssertNoConsoleError {
    async fn execute(&self, page: &dyn Page, _params: &serde_yaml::Value, _ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let errors = page.take_console_errors().await;
        if !errors.is_empty() {
            anyhow::bail!("console errors observed: {}", errors.join("; "));
        }
        Ok(())
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::shared_test_support::{FakeBrowserContext, FakePage};
    use crate::schema::HealingMode;
    use crate::selector::SelectorResolver;

    fn ctx<'a>(
        expander: &'a mut crate::expand::VariableExpander,
        resolver: &'a SelectorResolver,
        artifacts: &'a crate::artifacts::ArtifactsManager,
        browser_context: &'a FakeBrowserContext,
    ) -> StepContext<'a> {
        StepContext { expander, resolver, artifacts, browser_context, step_timeout: std::time::Duration::from_secs(1), frame: None }
    }

    #[tokio::test]
    async fn assert_no_console_error_fails_when_errors_present() {
        let page = FakePage { console_errors: vec!["TypeError: x is undefined".to_string()], ..Default::default() };
        let mut expander = crate::expand::VariableExpander::with_env(Default::default(), Default::default());
        let resolver = SelectorResolver::new(HealingMode::Off);
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = crate::artifacts::ArtifactsManager::create_run_dir(tmp.path(), crate::schema::ArtifactsConfig::default(), chrono::Utc::now()).unwrap();
        let browser_context = FakeBrowserContext::default();
        let mut c = ctx(&mut expander, &resolver, &artifacts, &browser_context);

        let params: serde_yaml::Value = serde_yaml::from_str("{}").unwrap();
        let err = AssertNoConsoleError.execute(&page, &params, &mut c).await.unwrap_err();
        assert!(err.to_string().contains("TypeError"));
    }

    #[tokio::test]
    async fn set_date_picker_reformats_with_chrono() {
        let page = FakePage::default();
        let mut expander = crate::expand::VariableExpander::with_env(Default::default(), Default::default());
        let resolver = SelectorResolver::new(HealingMode::Off);
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = crate::artifacts::ArtifactsManager::create_run_dir(tmp.path(), crate::schema::ArtifactsConfig::default(), chrono::Utc::now()).unwrap();
        let browser_context = FakeBrowserContext::default();
        let mut c = ctx(&mut expander, &resolver, &artifacts, &browser_context);

        let params: serde_yaml::Value = serde_yaml::from_str(
            r#"by: { testId: "dob" }
date: "2024-03-05"
format: "%m/%d/%Y""#,
        )
        .unwrap();
        SetDatePicker.execute(&page, &params, &mut c).await.unwrap();
        assert!(page.actions.lock().unwrap().iter().any(|a| a == "fill:testId:dob:03/05/2024"));
    }

    #[tokio::test]
    async fn click_wijmo_grid_cell_errors_when_column_missing() {
        let mut page = FakePage::default();
        page.elements.insert(("css", "#grid thead th".to_string()), (0, true));
        let mut expander = crate::expand::VariableExpander::with_env(Default::default(), Default::default());
        let resolver = SelectorResolver::new(HealingMode::Off);
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = crate::artifacts::ArtifactsManager::create_run_dir(tmp.path(), crate::schema::ArtifactsConfig::default(), chrono::Utc::now()).unwrap();
        let browser_context = FakeBrowserContext::default();
        let mut c = ctx(&mut expander, &resolver, &artifacts, &browser_context);

        let params: serde_yaml::Value = serde_yaml::from_str(r##"grid: "#grid"
row_key: "ORD-1"
column: "Status""##).unwrap();
        let err = ClickWijmoGridCell.execute(&page, &params, &mut c).await.unwrap_err();
        assert!(err.to_string().contains("column"));
    }

    #[tokio::test]
    async fn select_overlay_option_scopes_text_search_to_the_list() {
        let page = FakePage::default();
        let mut expander = crate::expand::VariableExpander::with_env(Default::default(), Default::default());
        let resolver = SelectorResolver::new(HealingMode::Off);
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = crate::artifacts::ArtifactsManager::create_run_dir(tmp.path(), crate::schema::ArtifactsConfig::default(), chrono::Utc::now()).unwrap();
        let browser_context = FakeBrowserContext::default();
        let mut c = ctx(&mut expander, &resolver, &artifacts, &browser_context);

        let params: serde_yaml::Value = serde_yaml::from_str(
            r#"open: { testId: "opener" }
list: { testId: "options" }
option_text: "Gold""#,
        )
        .unwrap();
        SelectOverlayOption.execute(&page, &params, &mut c).await.unwrap();

        let actions = page.actions.lock().unwrap();
        assert!(actions.iter().any(|a| a == "click:testId:opener"));
        assert!(actions.iter().any(|a| a == "by_text:testId:options:Gold"));
        assert!(actions.iter().any(|a| a == "click:testId:options>text:Gold"));
    }

    #[tokio::test]
    async fn select_wijmo_combo_scopes_text_search_to_the_dropdown() {
        let page = FakePage::default();
        let mut expander = crate::expand::VariableExpander::with_env(Default::default(), Default::default());
        let resolver = SelectorResolver::new(HealingMode::Off);
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = crate::artifacts::ArtifactsManager::create_run_dir(tmp.path(), crate::schema::ArtifactsConfig::default(), chrono::Utc::now()).unwrap();
        let browser_context = FakeBrowserContext::default();
        let mut c = ctx(&mut expander, &resolver, &artifacts, &browser_context);

        let params: serde_yaml::Value = serde_yaml::from_str(
            r#"root: { testId: "combo" }
option_text: "Gold""#,
        )
        .unwrap();
        SelectWijmoCombo.execute(&page, &params, &mut c).await.unwrap();

        let actions = page.actions.lock().unwrap();
        assert!(actions.iter().any(|a| a == "click:testId:combo"));
        assert!(actions.iter().any(|a| a == "by_text:css:.wj-listbox.wj-content:visible:Gold"));
        assert!(actions.iter().any(|a| a == "click:css:.wj-listbox.wj-content:visible>text:Gold"));
    }
}
