use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_parties_tables::Migration),
            Box::new(m20250101_000002_create_load_sheets_table::Migration),
            Box::new(m20250101_000003_create_invoices_table::Migration),
            Box::new(m20250101_000004_create_statements_tables::Migration),
        ]
    }
}

#[derive(DeriveIden)]
enum Companies {
    Table,
    Id,
    Name,
    ContactPerson,
    Email,
    Phone,
    BillingAddress,
    VatNumber,
    RatePerPallet,
    PaymentTerms,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Contractors {
    Table,
    Id,
    Name,
    ContactPerson,
    Phone,
    Email,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum LoadSheets {
    Table,
    Id,
    CompanyId,
    PalletQuantity,
    RatePerPallet,
    CargoDescription,
    DeliveryMethod,
    ContractorName,
    ContractorCost,
    FinalRate,
    Status,
    RequestedDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Invoices {
    Table,
    Id,
    LoadSheetId,
    CompanyId,
    InvoiceNumber,
    InvoiceDate,
    DueDate,
    Subtotal,
    VatRate,
    VatAmount,
    TotalAmount,
    PaymentStatus,
    PaymentDate,
    EmailSentDate,
    EmailSentTo,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Statements {
    Table,
    Id,
    CompanyId,
    StatementPeriod,
    StatementDate,
    OpeningBalance,
    TotalCharges,
    TotalPayments,
    ClosingBalance,
    InvoiceCount,
    EmailSent,
    EmailSentDate,
    CreatedAt,
}

#[derive(DeriveIden)]
enum StatementItems {
    Table,
    Id,
    StatementId,
    InvoiceId,
    InvoiceNumber,
    InvoiceDate,
    Amount,
    PaymentStatus,
    PaymentDate,
}

fn money<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .decimal_len(12, 2)
        .not_null()
        .default(0)
        .to_owned()
}

mod m20250101_000001_create_parties_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_parties_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Companies::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Companies::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Companies::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Companies::ContactPerson).string().not_null())
                        .col(ColumnDef::new(Companies::Email).string().not_null())
                        .col(ColumnDef::new(Companies::Phone).string().not_null())
                        .col(ColumnDef::new(Companies::BillingAddress).text().null())
                        .col(ColumnDef::new(Companies::VatNumber).string().null())
                        .col(money(Companies::RatePerPallet))
                        .col(
                            ColumnDef::new(Companies::PaymentTerms)
                                .integer()
                                .not_null()
                                .default(30),
                        )
                        .col(
                            ColumnDef::new(Companies::Status)
                                .string()
                                .not_null()
                                .default("active"),
                        )
                        .col(
                            ColumnDef::new(Companies::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Companies::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Contractors::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Contractors::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Contractors::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Contractors::ContactPerson).string().null())
                        .col(ColumnDef::new(Contractors::Phone).string().null())
                        .col(ColumnDef::new(Contractors::Email).string().null())
                        .col(
                            ColumnDef::new(Contractors::Status)
                                .string()
                                .not_null()
                                .default("active"),
                        )
                        .col(
                            ColumnDef::new(Contractors::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Contractors::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Companies::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000002_create_load_sheets_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_load_sheets_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LoadSheets::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LoadSheets::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(LoadSheets::CompanyId).integer().not_null())
                        .col(
                            ColumnDef::new(LoadSheets::PalletQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(money(LoadSheets::RatePerPallet))
                        .col(ColumnDef::new(LoadSheets::CargoDescription).text().null())
                        .col(
                            ColumnDef::new(LoadSheets::DeliveryMethod)
                                .string()
                                .not_null()
                                .default("own"),
                        )
                        .col(ColumnDef::new(LoadSheets::ContractorName).string().null())
                        .col(money(LoadSheets::ContractorCost))
                        .col(money(LoadSheets::FinalRate))
                        .col(
                            ColumnDef::new(LoadSheets::Status)
                                .string()
                                .not_null()
                                .default("draft"),
                        )
                        .col(ColumnDef::new(LoadSheets::RequestedDate).date().not_null())
                        .col(
                            ColumnDef::new(LoadSheets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LoadSheets::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_load_sheets_company")
                                .from(LoadSheets::Table, LoadSheets::CompanyId)
                                .to(Companies::Table, Companies::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_load_sheets_company_id")
                        .table(LoadSheets::Table)
                        .col(LoadSheets::CompanyId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LoadSheets::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000003_create_invoices_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_invoices_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Invoices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Invoices::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Invoices::LoadSheetId).integer().not_null())
                        .col(ColumnDef::new(Invoices::CompanyId).integer().not_null())
                        .col(ColumnDef::new(Invoices::InvoiceNumber).string().not_null())
                        .col(ColumnDef::new(Invoices::InvoiceDate).date().not_null())
                        .col(ColumnDef::new(Invoices::DueDate).date().not_null())
                        .col(money(Invoices::Subtotal))
                        .col(
                            ColumnDef::new(Invoices::VatRate)
                                .decimal_len(5, 2)
                                .not_null(),
                        )
                        .col(money(Invoices::VatAmount))
                        .col(money(Invoices::TotalAmount))
                        .col(
                            ColumnDef::new(Invoices::PaymentStatus)
                                .string()
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(Invoices::PaymentDate).date().null())
                        .col(
                            ColumnDef::new(Invoices::EmailSentDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Invoices::EmailSentTo).string().null())
                        .col(
                            ColumnDef::new(Invoices::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_invoices_load_sheet")
                                .from(Invoices::Table, Invoices::LoadSheetId)
                                .to(LoadSheets::Table, LoadSheets::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_invoices_company")
                                .from(Invoices::Table, Invoices::CompanyId)
                                .to(Companies::Table, Companies::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            // Both uniqueness rules are backed here; the services rely on the
            // violation to detect concurrent allocations.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_invoices_invoice_number")
                        .table(Invoices::Table)
                        .col(Invoices::InvoiceNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_invoices_load_sheet_id")
                        .table(Invoices::Table)
                        .col(Invoices::LoadSheetId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_invoices_company_date")
                        .table(Invoices::Table)
                        .col(Invoices::CompanyId)
                        .col(Invoices::InvoiceDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Invoices::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000004_create_statements_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_statements_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Statements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Statements::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Statements::CompanyId).integer().not_null())
                        .col(
                            ColumnDef::new(Statements::StatementPeriod)
                                .string_len(7)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Statements::StatementDate).date().not_null())
                        .col(money(Statements::OpeningBalance))
                        .col(money(Statements::TotalCharges))
                        .col(money(Statements::TotalPayments))
                        .col(money(Statements::ClosingBalance))
                        .col(
                            ColumnDef::new(Statements::InvoiceCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Statements::EmailSent)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Statements::EmailSentDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Statements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_statements_company")
                                .from(Statements::Table, Statements::CompanyId)
                                .to(Companies::Table, Companies::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_statements_company_period")
                        .table(Statements::Table)
                        .col(Statements::CompanyId)
                        .col(Statements::StatementPeriod)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StatementItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StatementItems::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StatementItems::StatementId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StatementItems::InvoiceId).integer().not_null())
                        .col(
                            ColumnDef::new(StatementItems::InvoiceNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StatementItems::InvoiceDate)
                                .date()
                                .not_null(),
                        )
                        .col(money(StatementItems::Amount))
                        .col(
                            ColumnDef::new(StatementItems::PaymentStatus)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StatementItems::PaymentDate).date().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_statement_items_statement")
                                .from(StatementItems::Table, StatementItems::StatementId)
                                .to(Statements::Table, Statements::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_statement_items_invoice")
                                .from(StatementItems::Table, StatementItems::InvoiceId)
                                .to(Invoices::Table, Invoices::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_statement_items_statement_id")
                        .table(StatementItems::Table)
                        .col(StatementItems::StatementId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StatementItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Statements::Table).to_owned())
                .await
        }
    }
}
