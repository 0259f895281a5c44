/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `DWELLTRACK_DUCKDB_MEMORY`, default `"1GB"`). Always set an explicit
/// limit: the DuckDB default of 80% of system RAM is not acceptable for a
/// server process.
///
/// DuckDB parses but does not enforce `VARCHAR(n)` lengths, so visitor ids
/// longer than ten characters are stored verbatim.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- PAGE VIEWS (one row per closed dwell interval)
-- ===========================================
CREATE SEQUENCE IF NOT EXISTS page_view_id_seq START 1;
CREATE TABLE IF NOT EXISTS page_view (
    id              BIGINT PRIMARY KEY DEFAULT nextval('page_view_id_seq'),
    visitor_id      VARCHAR(10),                   -- NULL for anonymous visitors
    page            VARCHAR(255) NOT NULL,         -- tracked page label, e.g. 'HomePage'
    time_spent      INTEGER NOT NULL,              -- whole seconds, truncated
    start_time      TIMESTAMP NOT NULL             -- when the interval opened (UTC)
);
CREATE INDEX IF NOT EXISTS idx_page_view_visitor ON page_view(visitor_id);

-- ===========================================
-- BUTTON CLICKS
-- ===========================================
CREATE SEQUENCE IF NOT EXISTS button_id_seq START 1;
CREATE TABLE IF NOT EXISTS button (
    id              BIGINT PRIMARY KEY DEFAULT nextval('button_id_seq'),
    visitor_id      VARCHAR(10),
    button          BOOLEAN NOT NULL
);
"#
    )
}
