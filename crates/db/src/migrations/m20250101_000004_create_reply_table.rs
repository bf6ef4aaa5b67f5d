//! Create reply table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reply::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Reply::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Reply::PostId).string_len(32).not_null())
                    .col(ColumnDef::new(Reply::CommentId).string_len(32).not_null())
                    .col(ColumnDef::new(Reply::ReplyOwnerId).string_len(32).not_null())
                    .col(ColumnDef::new(Reply::Content).text().not_null())
                    .col(ColumnDef::new(Reply::LikeTotal).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Reply::LikeUsers)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Reply::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Reply::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reply_comment_id")
                    .table(Reply::Table)
                    .col(Reply::CommentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reply_post_id")
                    .table(Reply::Table)
                    .col(Reply::PostId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reply::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Reply {
    Table,
    Id,
    PostId,
    CommentId,
    ReplyOwnerId,
    Content,
    LikeTotal,
    LikeUsers,
    CreatedAt,
    UpdatedAt,
}
