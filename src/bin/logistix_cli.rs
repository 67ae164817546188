use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use logistix_api::{
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::InvoiceDisplayStatus,
    handlers::AppServices,
    services::{
        dashboard::DashboardSummary,
        invoicing::{InvoiceFilter, InvoiceView, IssuedInvoice},
        statements::{StatementDetails, StatementFilter, StatementPeriod, StatementView},
        Pagination,
    },
};
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::Invoices(command) => handle_invoices_command(&context, command, cli.json).await?,
        Commands::Statements(command) => {
            handle_statements_command(&context, command, cli.json).await?
        }
        Commands::Dashboard => {
            let summary = context.services.dashboard.summary().await?;
            if cli.json {
                print_json(&summary)?;
            } else {
                render_dashboard(&summary);
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "logistix", about = "Logistix CLI for invoicing and statements", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    #[command(subcommand)]
    Invoices(InvoicesCommands),
    #[command(subcommand)]
    Statements(StatementsCommands),
    /// Print the billing overview
    Dashboard,
}

#[derive(Subcommand)]
enum InvoicesCommands {
    Create(CreateInvoiceArgs),
    Paid(MarkPaidArgs),
    Email(EmailArgs),
    List(ListInvoicesArgs),
}

#[derive(Subcommand)]
enum StatementsCommands {
    Generate(GenerateStatementArgs),
    Show(ShowArgs),
    Email(EmailArgs),
    List(ListStatementsArgs),
}

#[derive(Args)]
struct CreateInvoiceArgs {
    #[arg(long, help = "Load sheet to invoice")]
    load_sheet: i32,
    #[arg(long, help = "Invoice date (YYYY-MM-DD); defaults to today")]
    date: Option<NaiveDate>,
}

#[derive(Args)]
struct MarkPaidArgs {
    #[arg(long, help = "Invoice identifier")]
    id: i32,
    #[arg(long, help = "Payment date (YYYY-MM-DD); defaults to today")]
    date: Option<NaiveDate>,
}

#[derive(Args)]
struct EmailArgs {
    #[arg(long, help = "Invoice or statement identifier")]
    id: i32,
    #[arg(long, help = "Recipient email address")]
    to: String,
}

#[derive(Args)]
struct ListInvoicesArgs {
    #[arg(long)]
    company: Option<i32>,
    #[arg(long, help = "pending, paid or overdue")]
    status: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: u64,
    #[arg(long, default_value_t = 20)]
    limit: u64,
}

#[derive(Args)]
struct GenerateStatementArgs {
    #[arg(long, help = "Company identifier")]
    company: i32,
    #[arg(long, help = "Statement month as YYYY-MM")]
    period: String,
}

#[derive(Args)]
struct ShowArgs {
    #[arg(long)]
    id: i32,
}

#[derive(Args)]
struct ListStatementsArgs {
    #[arg(long)]
    company: Option<i32>,
    #[arg(long, default_value_t = 1)]
    page: u64,
    #[arg(long, default_value_t = 20)]
    limit: u64,
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
    services: AppServices,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);
        let services = AppServices::from_config(db.clone(), &config)
            .context("failed to initialise services")?;

        Ok(Self {
            config,
            db,
            services,
        })
    }

    fn pagination(&self, page: u64, limit: u64) -> Pagination {
        Pagination::new(page, limit).clamped(self.config.api_max_page_size)
    }
}

async fn handle_invoices_command(
    context: &CliContext,
    command: InvoicesCommands,
    json: bool,
) -> Result<()> {
    let invoicing = &context.services.invoicing;
    match command {
        InvoicesCommands::Create(args) => {
            let issued = match args.date {
                Some(date) => invoicing.issue_invoice_on(args.load_sheet, date).await?,
                None => invoicing.create_invoice(args.load_sheet).await?,
            };
            if json {
                print_json(&issued)?;
            } else {
                render_issued(&issued);
            }
        }
        InvoicesCommands::Paid(args) => {
            let invoice = match args.date {
                Some(date) => invoicing.mark_invoice_paid_on(args.id, date).await?,
                None => invoicing.mark_invoice_paid(args.id).await?,
            };
            if json {
                print_json(&invoice)?;
            } else {
                render_invoice(&invoice);
            }
        }
        InvoicesCommands::Email(args) => {
            let invoice = invoicing.send_invoice_email(args.id, &args.to).await?;
            if json {
                print_json(&invoice)?;
            } else {
                println!("Invoice {} sent to {}", invoice.invoice_number, args.to);
            }
        }
        InvoicesCommands::List(args) => {
            let status = args
                .status
                .as_deref()
                .map(|raw| {
                    raw.parse::<InvoiceDisplayStatus>()
                        .with_context(|| format!("unknown invoice status '{}'", raw))
                })
                .transpose()?;
            let filter = InvoiceFilter {
                company_id: args.company,
                status,
            };
            let page = invoicing
                .list_invoices(filter, context.pagination(args.page, args.limit))
                .await?;
            if json {
                print_json(&page)?;
            } else {
                println!("{} invoice(s), page {} of {}", page.total, page.page, page.total_pages);
                page.items.iter().for_each(render_invoice);
            }
        }
    }
    Ok(())
}

async fn handle_statements_command(
    context: &CliContext,
    command: StatementsCommands,
    json: bool,
) -> Result<()> {
    let statements = &context.services.statements;
    match command {
        StatementsCommands::Generate(args) => {
            let period: StatementPeriod = args.period.parse()?;
            let generated = statements.generate_statement(args.company, period).await?;
            if json {
                print_json(&generated)?;
            } else {
                render_statement(&generated.statement);
                if let Some(doc) = &generated.document {
                    println!("  document: {}", doc.url);
                }
            }
        }
        StatementsCommands::Show(args) => {
            let details = statements.get_statement_details(args.id).await?;
            if json {
                print_json(&details)?;
            } else {
                render_statement_details(&details);
            }
        }
        StatementsCommands::Email(args) => {
            let statement = statements.send_statement_email(args.id, &args.to).await?;
            if json {
                print_json(&statement)?;
            } else {
                println!("Statement {} sent to {}", statement.statement_number, args.to);
            }
        }
        StatementsCommands::List(args) => {
            let filter = StatementFilter {
                company_id: args.company,
            };
            let page = statements
                .list_statements(filter, context.pagination(args.page, args.limit))
                .await?;
            if json {
                print_json(&page)?;
            } else {
                println!("{} statement(s), page {} of {}", page.total, page.page, page.total_pages);
                page.items.iter().for_each(render_statement);
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_issued(issued: &IssuedInvoice) {
    println!(
        "Issued {} • total {} • dated {} • due {}",
        issued.invoice_number, issued.total_amount, issued.invoice_date, issued.due_date
    );
    if let Some(doc) = &issued.document {
        println!("  document: {}", doc.url);
    }
}

fn render_invoice(invoice: &InvoiceView) {
    println!(
        "- {} • {} • total {} • due {} • {}",
        invoice.invoice_number,
        invoice.company_name.as_deref().unwrap_or("unknown company"),
        invoice.total_amount,
        invoice.due_date,
        invoice.status
    );
}

fn render_statement(statement: &StatementView) {
    println!(
        "- {} • {} • {} • opening {} • charges {} • payments {} • closing {}",
        statement.statement_number,
        statement.company_name.as_deref().unwrap_or("unknown company"),
        statement.period_label,
        statement.opening_balance,
        statement.total_charges,
        statement.total_payments,
        statement.closing_balance
    );
}

fn render_statement_details(details: &StatementDetails) {
    render_statement(&details.statement);
    for item in &details.items {
        let paid = item
            .payment_date
            .map(|d| format!("paid {}", d))
            .unwrap_or_else(|| item.payment_status.to_string());
        println!(
            "    {} • {} • {} • {}",
            item.invoice_number, item.invoice_date, item.amount, paid
        );
    }
}

fn render_dashboard(summary: &DashboardSummary) {
    println!("Billing overview as of {}", summary.as_of);
    println!("  invoices this month: {}", summary.invoices_this_month);
    println!("  outstanding:         {}", summary.outstanding_balance);
    println!(
        "  overdue:             {} ({} invoice(s))",
        summary.overdue_balance, summary.overdue_count
    );
    println!("  active companies:    {}", summary.active_companies);
    if !summary.pending_invoices.is_empty() {
        println!("Next due:");
        summary.pending_invoices.iter().for_each(render_invoice);
    }
}
