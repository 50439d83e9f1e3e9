use sqlx::PgPool;

use super::User;

const USER_COLUMNS: &str = "id, username, email, password_hash, is_staff, created_at";

pub async fn get_user(pool: &PgPool, user_id: i32) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn create_user(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
    is_staff: bool,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, password_hash, is_staff) \
         VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
    ))
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(is_staff)
    .fetch_one(pool)
    .await
}

/// Permission codenames held directly or through any group.
pub async fn user_permissions(pool: &PgPool, user_id: i32) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT p.codename FROM permissions p
        JOIN user_permissions up ON up.permission_id = p.id
        WHERE up.user_id = $1
        UNION
        SELECT p.codename FROM permissions p
        JOIN group_permissions gp ON gp.permission_id = p.id
        JOIN user_groups ug ON ug.group_id = gp.group_id
        WHERE ug.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn user_groups(pool: &PgPool, user_id: i32) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT g.name FROM groups g
        JOIN user_groups ug ON ug.group_id = g.id
        WHERE ug.user_id = $1
        ORDER BY g.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Adds the user to the named group, creating the group if needed.
pub async fn add_user_to_group(
    pool: &PgPool,
    user_id: i32,
    group_name: &str,
) -> Result<(), sqlx::Error> {
    let group_id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO groups (name) VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(group_name)
    .fetch_one(pool)
    .await?;

    sqlx::query(
        "INSERT INTO user_groups (user_id, group_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(group_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Grants a permission directly to a user. Returns `false` when the codename
/// does not exist.
pub async fn grant_permission(
    pool: &PgPool,
    user_id: i32,
    codename: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO user_permissions (user_id, permission_id)
        SELECT $1, id FROM permissions WHERE codename = $2
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(codename)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(true);
    }
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM permissions WHERE codename = $1)")
            .bind(codename)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Creates the permission if missing. Returns `true` when it was created.
pub async fn ensure_permission(
    pool: &PgPool,
    codename: &str,
    name: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO permissions (codename, name) VALUES ($1, $2) ON CONFLICT (codename) DO NOTHING",
    )
    .bind(codename)
    .bind(name)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Users holding the permission directly or through a group.
pub async fn users_with_permission(
    pool: &PgPool,
    codename: &str,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS} FROM users
        WHERE id IN (
            SELECT up.user_id FROM user_permissions up
            JOIN permissions p ON p.id = up.permission_id
            WHERE p.codename = $1
            UNION
            SELECT ug.user_id FROM user_groups ug
            JOIN group_permissions gp ON gp.group_id = ug.group_id
            JOIN permissions p ON p.id = gp.permission_id
            WHERE p.codename = $1
        )
        ORDER BY username
        "#
    ))
    .bind(codename)
    .fetch_all(pool)
    .await
}
