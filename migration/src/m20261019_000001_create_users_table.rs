use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::FirstName).string())
                    .col(ColumnDef::new(Users::LastName).string())
                    .col(ColumnDef::new(Users::Username).string())
                    .col(ColumnDef::new(Users::PhoneNumber).string())
                    .col(
                        ColumnDef::new(Users::AgreedToTerms)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Users::AgreedAt).timestamp())
                    .col(ColumnDef::new(Users::State).string_len(32))
                    .col(ColumnDef::new(Users::ContactFileId).string())
                    .col(ColumnDef::new(Users::TargetPhone).string())
                    .col(
                        ColumnDef::new(Users::PaymentScreenshotFileIds)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(Users::UserRequest).text())
                    .col(ColumnDef::new(Users::FirstMessageId).integer())
                    .col(
                        ColumnDef::new(Users::LinkCounter)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::ServiceLinkCounter)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Optional lookup by handle
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_username")
                    .table(Users::Table)
                    .col(Users::Username)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    FirstName,
    LastName,
    Username,
    PhoneNumber,
    AgreedToTerms,
    AgreedAt,
    State,
    ContactFileId,
    TargetPhone,
    PaymentScreenshotFileIds,
    UserRequest,
    FirstMessageId,
    LinkCounter,
    ServiceLinkCounter,
    CreatedAt,
}
