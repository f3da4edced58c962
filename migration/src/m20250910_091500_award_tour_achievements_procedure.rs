use sea_orm_migration::{
    prelude::*,
    sea_orm::{ConnectionTrait, DatabaseBackend},
};

#[derive(DeriveMigrationName)]
pub struct Migration;

// Grants the category badge of `p_tour_id` and every milestone the user's
// completed-booking count has reached. Badge rules come from badge_definition,
// conflicts on (user_id, badge_type) are skipped. Returns the badge types this
// call inserted, so concurrent callers never report each other's grants.
const CREATE_FUNCTION: &str = r#"
CREATE OR REPLACE FUNCTION award_tour_achievements(p_user_id integer, p_tour_id integer)
RETURNS SETOF text
LANGUAGE plpgsql
AS $$
DECLARE
    v_completed integer;
BEGIN
    IF NOT EXISTS (
        SELECT 1 FROM booking
        WHERE user_id = p_user_id AND tour_id = p_tour_id AND status = 'completed'
    ) THEN
        RETURN;
    END IF;

    SELECT count(*) INTO v_completed
    FROM booking
    WHERE user_id = p_user_id AND status = 'completed';

    RETURN QUERY
    WITH granted AS (
        INSERT INTO achievement
            (user_id, badge_type, badge_name, badge_description, tour_id, verification_data, unlock_date)
        SELECT p_user_id, d.badge_type, d.badge_name, d.badge_description, p_tour_id,
               json_build_object('source', 'procedure', 'tour_id', p_tour_id, 'completed_count', v_completed),
               now() AT TIME ZONE 'utc'
        FROM badge_definition d
        JOIN tour t ON t.category = d.category
        WHERE t.id = p_tour_id
        ON CONFLICT (user_id, badge_type) DO NOTHING
        RETURNING achievement.badge_type
    )
    SELECT granted.badge_type::text FROM granted;

    RETURN QUERY
    WITH granted AS (
        INSERT INTO achievement
            (user_id, badge_type, badge_name, badge_description, tour_id, verification_data, unlock_date)
        SELECT p_user_id, d.badge_type, d.badge_name, d.badge_description, NULL,
               json_build_object('source', 'procedure', 'completed_count', v_completed),
               now() AT TIME ZONE 'utc'
        FROM badge_definition d
        WHERE d.milestone IS NOT NULL AND d.milestone <= v_completed
        ON CONFLICT (user_id, badge_type) DO NOTHING
        RETURNING achievement.badge_type
    )
    SELECT granted.badge_type::text FROM granted;
END;
$$;
"#;

const DROP_FUNCTION: &str = "DROP FUNCTION IF EXISTS award_tour_achievements(integer, integer);";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Other backends run the manual granting path only.
        if manager.get_database_backend() != DatabaseBackend::Postgres {
            return Ok(());
        }
        manager
            .get_connection()
            .execute_unprepared(CREATE_FUNCTION)
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.get_database_backend() != DatabaseBackend::Postgres {
            return Ok(());
        }
        manager
            .get_connection()
            .execute_unprepared(DROP_FUNCTION)
            .await?;
        Ok(())
    }
}
