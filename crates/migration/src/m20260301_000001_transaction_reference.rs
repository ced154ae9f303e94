use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Transactions {
    Table,
    Reference,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Transactions::Table)
                    .add_column(ColumnDef::new(Transactions::Reference).string())
                    .to_owned(),
            )
            .await?;

        // NULL references never collide, so only keyed fundings are deduplicated.
        manager
            .create_index(
                Index::create()
                    .name("uidx-transactions-reference")
                    .table(Transactions::Table)
                    .col(Transactions::Reference)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("uidx-transactions-reference")
                    .table(Transactions::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Transactions::Table)
                    .drop_column(Transactions::Reference)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
