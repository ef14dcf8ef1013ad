use comfy_table::{presets::NOTHING, *};
use covid_atlas_core::datasets::DatasetStatus;
use itertools::izip;
use polars::prelude::*;

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

fn bold(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

pub fn datasets_table(statuses: &[DatasetStatus]) -> Table {
    let mut table = base_table();
    table.set_header(vec![
        bold("Alias"),
        bold("Domain"),
        bold("Last modified"),
        bold("Path"),
    ]);
    for status in statuses {
        let modified = status
            .modified
            .map(|modified| modified.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "missing".to_string());
        table.add_row(vec![
            status.dataset.to_string(),
            status.dataset.domain().to_string(),
            modified,
            status.path.display().to_string(),
        ]);
    }
    table
}

pub fn display_datasets(statuses: &[DatasetStatus]) {
    println!("\n{}", datasets_table(statuses));
}

/// The `top` jurisdictions of `df` by descending `metric`.
pub fn summary_table(
    df: &DataFrame,
    jurisdiction_key: &str,
    metric: &str,
    top: usize,
) -> anyhow::Result<Table> {
    let df_to_show = df
        .sort(
            [metric],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_nulls_last(true),
        )?
        .head(Some(top));
    let mut table = base_table();
    table.set_header(vec![bold("Rank"), bold(jurisdiction_key), bold(metric)]);
    for (rank, jurisdiction, value) in izip!(
        1..,
        df_to_show.column(jurisdiction_key)?.str()?,
        df_to_show.column(metric)?.f64()?
    ) {
        table.add_row(vec![
            rank.to_string(),
            jurisdiction.unwrap_or_default().to_string(),
            value.map(|v| format!("{v:.6e}")).unwrap_or_default(),
        ]);
    }
    let column = table
        .column_mut(2)
        .ok_or_else(|| anyhow::anyhow!("Summary table has no value column"))?;
    column.set_cell_alignment(CellAlignment::Right);
    Ok(table)
}

pub fn display_summary(
    df: &DataFrame,
    jurisdiction_key: &str,
    metric: &str,
    top: usize,
) -> anyhow::Result<()> {
    println!("\n{}", summary_table(df, jurisdiction_key, metric, top)?);
    Ok(())
}
