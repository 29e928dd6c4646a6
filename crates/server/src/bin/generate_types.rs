use std::{fs, path::Path};

use board::{
    FloorRow, Grid, HeaderInfo, PaletteColor, UnitCell,
    view::{CellView, GridView, RowView},
};
use ts_rs::TS;
use utils::response::ApiResponse;

fn generate_types_content() -> String {
    let decls = [
        PaletteColor::decl(),
        HeaderInfo::decl(),
        UnitCell::decl(),
        FloorRow::decl(),
        Grid::decl(),
        CellView::decl(),
        RowView::decl(),
        GridView::decl(),
        ApiResponse::<()>::decl(),
    ];
    let body = decls
        .iter()
        .map(|decl| {
            let trimmed = decl.trim_start();
            if trimmed.starts_with("export") {
                trimmed.to_string()
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `cargo run --bin generate_types`. Do not edit by hand.\n\n{body}\n"
    )
}

fn main() -> anyhow::Result<()> {
    let check = std::env::args().any(|arg| arg == "--check");
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../shared/types.ts");
    let content = generate_types_content();

    if check {
        let current = fs::read_to_string(&path).unwrap_or_default();
        if current != content {
            anyhow::bail!("{} is out of date; run generate_types", path.display());
        }
        println!("{} is up to date", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content)?;
    println!("Wrote {}", path.display());
    Ok(())
}
