//! Command-line front end for the commercial simulator.
//!
//! Usage:
//!     simulador inspect tabela.xlsx
//!     simulador products tabela.xlsx --search detergente --group DETERGENTE
//!     simulador quote tabela.xlsx --code 9880 --unit caixa --quantity 3 --amount 2
//!     simulador simulate tabela.xlsx --plan pedido.json --output exports/

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sadio_catalog::{Catalog, CatalogConfig, CatalogError, CatalogFilter};
use sadio_columns::suggest_similar;
use sadio_ingest::SpreadsheetConfig;
use sadio_model::{Discount, LineItem, ProductRow, SaleUnit};
use sadio_pricing::{format_currency, format_percent, DiscountQuote, PricingConfig};
use sadio_simulation::{export_csv, export_file_name, Session, SimulationTotals};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "simulador")]
#[command(about = "Simulate commercial quotes from a supplier price list")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: Format,

    /// Zero-based spreadsheet row holding the header
    #[arg(long, default_value_t = 2, global = true)]
    header_row: usize,

    /// Keep the last spreadsheet row instead of dropping it as a footer
    #[arg(long, global = true)]
    keep_footer: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a price list was read and mapped
    Inspect {
        /// Price list (.xlsx or delimited text)
        file: PathBuf,
    },

    /// List products, optionally filtered
    Products {
        file: PathBuf,

        /// Text to find in description, code or EAN
        #[arg(short, long)]
        search: Option<String>,

        #[arg(short, long)]
        group: Option<String>,

        #[arg(short, long)]
        brand: Option<String>,

        /// Maximum rows shown
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Preview a discount on one product
    Quote {
        file: PathBuf,

        /// Product code or exact description
        #[arg(short, long)]
        code: String,

        #[arg(short, long, value_enum, default_value = "case")]
        unit: UnitArg,

        #[arg(short, long, default_value = "1")]
        quantity: u32,

        #[command(flatten)]
        discount: DiscountArgs,
    },

    /// Build a simulation from a plan file and export it
    Simulate {
        file: PathBuf,

        /// JSON list of {code, unit, quantity, discount}
        #[arg(short, long)]
        plan: PathBuf,

        /// Directory for the export file
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    #[value(alias = "caixa", alias = "cx")]
    Case,
    #[value(alias = "unidade", alias = "un")]
    Unit,
}

impl From<UnitArg> for SaleUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Case => SaleUnit::Case,
            UnitArg::Unit => SaleUnit::Unit,
        }
    }
}

#[derive(Args)]
#[group(multiple = false)]
struct DiscountArgs {
    /// Discount as a percentage of the base price
    #[arg(long)]
    percent: Option<f64>,

    /// Discount as a currency amount per unit sold
    #[arg(long)]
    amount: Option<f64>,
}

impl DiscountArgs {
    fn discount(&self) -> Discount {
        match (self.percent, self.amount) {
            (_, Some(amount)) => Discount::Amount(amount),
            (Some(percent), None) => Discount::Percent(percent),
            (None, None) => Discount::Percent(0.0),
        }
    }
}

/// One line of a simulation plan.
#[derive(Debug, Deserialize)]
struct PlanEntry {
    /// Product code or exact description
    code: String,
    #[serde(default)]
    unit: SaleUnit,
    #[serde(default = "default_quantity")]
    quantity: u32,
    #[serde(default)]
    discount: Discount,
}

fn default_quantity() -> u32 {
    1
}

fn main() -> Result<()> {
    // Logs go to stderr so JSON output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sadio=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = CatalogConfig {
        spreadsheet: SpreadsheetConfig {
            header_row: cli.header_row,
            drop_footer: !cli.keep_footer,
            ..Default::default()
        },
        ..Default::default()
    };

    match &cli.command {
        Commands::Inspect { file } => {
            let session = open_session(file, config)?;
            run_inspect(loaded(&session)?, cli.format)?;
        }
        Commands::Products {
            file,
            search,
            group,
            brand,
            limit,
        } => {
            let session = open_session(file, config)?;
            let filter = CatalogFilter {
                search: search.clone(),
                group: group.clone(),
                brand: brand.clone(),
            };
            run_products(loaded(&session)?, &filter, *limit, cli.format)?;
        }
        Commands::Quote {
            file,
            code,
            unit,
            quantity,
            discount,
        } => {
            let session = open_session(file, config)?;
            let quote = session.preview(code, (*unit).into(), *quantity, discount.discount())?;
            print_quote(code, &quote, cli.format)?;
        }
        Commands::Simulate { file, plan, output } => {
            let mut session = open_session(file, config)?;
            run_simulate(&mut session, plan, output, cli.format)?;
        }
    }

    Ok(())
}

fn open_session(path: &Path, config: CatalogConfig) -> Result<Session> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut session = Session::new(config, PricingConfig::default());
    if let Err(e) = session.load_upload(&name, &bytes) {
        if let CatalogError::MissingColumns { missing, available } = &e {
            for (field, column) in suggest_similar(missing, available) {
                eprintln!("  '{}' may be: '{}'", field, column);
            }
        }
        return Err(e).with_context(|| format!("could not load {}", path.display()));
    }
    Ok(session)
}

fn loaded(session: &Session) -> Result<&Catalog> {
    session.catalog().context("no price list loaded")
}

#[derive(Serialize)]
struct InspectReport<'a> {
    columns: &'a [String],
    mapping: &'a sadio_columns::ColumnMapping,
    stats: sadio_catalog::CatalogStats,
    groups: Vec<&'a str>,
    brands: Vec<&'a str>,
}

fn run_inspect(catalog: &Catalog, format: Format) -> Result<()> {
    let report = InspectReport {
        columns: catalog.columns(),
        mapping: catalog.mapping(),
        stats: catalog.stats(),
        groups: catalog.groups(),
        brands: catalog.brands(),
    };

    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Columns: {}", report.columns.join(", "));
    println!("Mapping:");
    for (field, column) in report.mapping.entries() {
        println!("   '{}' -> '{}'", column, field);
    }
    println!("---");
    println!("Products: {}", report.stats.products);
    println!("Groups: {}", report.stats.groups);
    if let Some(mean) = report.stats.mean_price_case {
        println!("Average case price: {}", format_currency(mean));
    }
    if let Some(mean) = report.stats.mean_price_unit {
        println!("Average unit price: {}", format_currency(mean));
    }
    if !report.groups.is_empty() {
        println!("Group list: {}", report.groups.join(", "));
    }
    if !report.brands.is_empty() {
        println!("Brands: {}", report.brands.join(", "));
    }

    Ok(())
}

fn run_products(catalog: &Catalog, filter: &CatalogFilter, limit: usize, format: Format) -> Result<()> {
    let products = catalog.filter(filter);
    let shown: Vec<&ProductRow> = products.iter().take(limit).copied().collect();

    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    println!("Available products ({})", products.len());
    println!(
        "{:<8} {:<48} {:>6} {:>12} {:>12} {:<16} {}",
        "Cod", "Descrição", "QTD", "Preco CX", "Preco UN", "Grupo", "Marca"
    );
    for p in &shown {
        println!(
            "{:<8} {:<48} {:>6} {:>12} {:>12} {:<16} {}",
            p.code,
            p.description,
            p.quantity_per_pack.map(|q| q.to_string()).unwrap_or_default(),
            format_currency(p.price_per_case),
            format_currency(p.price_per_unit),
            p.group.as_deref().unwrap_or(""),
            p.brand.as_deref().unwrap_or(""),
        );
    }
    if products.is_empty() {
        println!("No product matches the filters.");
    } else if products.len() > shown.len() {
        println!("... {} more", products.len() - shown.len());
    }

    Ok(())
}

fn print_quote(product: &str, quote: &DiscountQuote, format: Format) -> Result<()> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(quote)?);
        return Ok(());
    }

    println!("Product: {}", product);
    println!("Base price: {}", format_currency(quote.base_price));
    println!(
        "Discount ({}): {} | {}",
        quote.mode.label(),
        format_percent(quote.discount_percent),
        format_currency(quote.discount_amount)
    );
    println!("Price with discount: {}", format_currency(quote.breakdown.unit_price_after));
    println!(
        "Total for {}: {} (before discount {}, saving {})",
        quote.quantity,
        format_currency(quote.breakdown.total_after),
        format_currency(quote.breakdown.total_before),
        format_currency(quote.breakdown.discount_total)
    );

    Ok(())
}

#[derive(Serialize)]
struct SimulationReport<'a> {
    items: &'a [LineItem],
    totals: SimulationTotals,
    export: PathBuf,
}

fn run_simulate(session: &mut Session, plan: &Path, output: &Path, format: Format) -> Result<()> {
    let plan_text =
        std::fs::read_to_string(plan).with_context(|| format!("failed to read {}", plan.display()))?;
    let entries: Vec<PlanEntry> =
        serde_json::from_str(&plan_text).with_context(|| format!("invalid plan {}", plan.display()))?;

    for (i, entry) in entries.iter().enumerate() {
        session
            .add_item(&entry.code, entry.unit, entry.quantity, entry.discount)
            .with_context(|| format!("plan entry {} ({})", i + 1, entry.code))?;
    }

    let simulation = session.simulation();
    let export_path = output.join(export_file_name(chrono::Local::now().naive_local()));
    std::fs::write(&export_path, export_csv(simulation.items())?)
        .with_context(|| format!("failed to write {}", export_path.display()))?;
    tracing::info!(path = %export_path.display(), "Simulation exported");

    let report = SimulationReport {
        items: simulation.items(),
        totals: simulation.totals(),
        export: export_path,
    };

    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{:>4} {:<8} {:<40} {:<8} {:>4} {:>12} {:>7} {:>12} {:<12} {:>12} {:>12}",
        "Item", "Código", "Descrição", "Tipo", "Qtd", "Preço Base", "Desc %", "Desc R$", "Tipo Desc.",
        "Preço c/Desc", "Total"
    );
    for (i, item) in report.items.iter().enumerate() {
        println!(
            "{:>4} {:<8} {:<40} {:<8} {:>4} {:>12} {:>7} {:>12} {:<12} {:>12} {:>12}",
            i + 1,
            item.product_code,
            item.description,
            item.sale_unit.label(),
            item.quantity,
            format_currency(item.base_price),
            format_percent(item.discount_percent),
            format_currency(item.discount_amount),
            item.discount_mode.label(),
            format_currency(item.unit_price_after_discount),
            format_currency(item.line_total_after_discount),
        );
    }

    println!("\n---");
    println!("Total before discount: {}", format_currency(report.totals.total_before));
    println!("Total with discount: {}", format_currency(report.totals.total_after));
    println!("Total discount: {}", format_currency(report.totals.total_discount));
    println!("Average discount: {}", format_percent(report.totals.average_discount_percent));
    println!("Exported to {}", report.export.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_discount_args() {
        let cli = Cli::parse_from(["simulador", "quote", "t.csv", "-c", "9880", "--amount", "2"]);
        match cli.command {
            Commands::Quote { discount, unit, .. } => {
                assert_eq!(discount.discount(), Discount::Amount(2.0));
                assert_eq!(SaleUnit::from(unit), SaleUnit::Case);
            }
            _ => panic!("expected quote"),
        }
        assert!(Cli::try_parse_from([
            "simulador", "quote", "t.csv", "-c", "1", "--amount", "2", "--percent", "5"
        ])
        .is_err());
    }

    #[test]
    fn test_plan_entry_defaults() {
        let entries: Vec<PlanEntry> = serde_json::from_str(
            r#"[{"code": "9880"}, {"code": "7001", "unit": "unit", "quantity": 4, "discount": {"amount": 0.5}}]"#,
        )
        .unwrap();
        assert_eq!(entries[0].quantity, 1);
        assert_eq!(entries[0].unit, SaleUnit::Case);
        assert_eq!(entries[0].discount, Discount::Percent(0.0));
        assert_eq!(entries[1].unit, SaleUnit::Unit);
        assert_eq!(entries[1].discount, Discount::Amount(0.5));
    }
}
