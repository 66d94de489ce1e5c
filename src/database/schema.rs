//! Table layout shared with existing deployments.
//!
//! The compute tables at the top (aggregates, instance types, quotas, key
//! pairs, volume types, QoS specs) have no operations in this crate; they
//! are created so the database stays interoperable.

pub const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS aggregates (
        id SERIAL PRIMARY KEY,
        name VARCHAR(255) UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS aggregate_metadata (
        id SERIAL PRIMARY KEY,
        key VARCHAR(255) NOT NULL,
        value VARCHAR(255) NOT NULL,
        aggregate_id INTEGER NOT NULL REFERENCES aggregates (id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ,
        CONSTRAINT uniq_aggregate_metadata0aggregate_id0key UNIQUE (aggregate_id, key)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS aggregate_metadata_key_idx ON aggregate_metadata (key)",
    r#"
    CREATE TABLE IF NOT EXISTS instance_types (
        id SERIAL PRIMARY KEY,
        name VARCHAR(255) UNIQUE,
        memory_mb INTEGER NOT NULL,
        vcpus INTEGER NOT NULL,
        root_gb INTEGER,
        ephemeral_gb INTEGER,
        flavorid VARCHAR(255) UNIQUE,
        swap INTEGER NOT NULL DEFAULT 0,
        rxtx_factor DOUBLE PRECISION DEFAULT 1,
        vcpu_weight INTEGER,
        disabled BOOLEAN DEFAULT FALSE,
        is_public BOOLEAN DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS instance_type_projects (
        id SERIAL PRIMARY KEY,
        instance_type_id INTEGER NOT NULL REFERENCES instance_types (id),
        project_id VARCHAR(255),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ,
        CONSTRAINT uniq_instance_type_projects0instance_type_id0project_id
            UNIQUE (instance_type_id, project_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS instance_type_extra_specs (
        id SERIAL PRIMARY KEY,
        key VARCHAR(255),
        value VARCHAR(255),
        instance_type_id INTEGER NOT NULL REFERENCES instance_types (id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ,
        CONSTRAINT uniq_instance_type_extra_specs0instance_type_id0key
            UNIQUE (instance_type_id, key)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS instance_type_extra_specs_instance_type_id_key_idx
        ON instance_type_extra_specs (instance_type_id, key)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS key_pairs (
        id SERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        user_id VARCHAR(255),
        fingerprint VARCHAR(255),
        public_key TEXT,
        type VARCHAR(5) NOT NULL DEFAULT 'ssh' CHECK (type IN ('ssh', 'x509')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ,
        CONSTRAINT uniq_key_pairs0user_id0name UNIQUE (user_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS quotas (
        id SERIAL PRIMARY KEY,
        project_id VARCHAR(255),
        resource VARCHAR(255) NOT NULL,
        hard_limit INTEGER,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ,
        CONSTRAINT uniq_quotas0project_id0resource UNIQUE (project_id, resource)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS quality_of_service_specs (
        id VARCHAR(36) PRIMARY KEY,
        specs_id VARCHAR(36) REFERENCES quality_of_service_specs (id),
        key VARCHAR(255),
        value VARCHAR(255),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS volume_types (
        id VARCHAR(36) PRIMARY KEY,
        name VARCHAR(255) UNIQUE,
        description VARCHAR(255),
        qos_specs_id VARCHAR(36) REFERENCES quality_of_service_specs (id),
        is_public BOOLEAN DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cascaded_sites (
        site_id VARCHAR(64) PRIMARY KEY,
        site_name VARCHAR(64) NOT NULL UNIQUE,
        az_id VARCHAR(64) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cascaded_site_service_configuration (
        service_id VARCHAR(64) PRIMARY KEY,
        site_id VARCHAR(64) NOT NULL REFERENCES cascaded_sites (site_id),
        service_type VARCHAR(64) NOT NULL,
        service_url VARCHAR(512) NOT NULL,
        CONSTRAINT cascaded_site_service_configuration0site_id0service_type
            UNIQUE (site_id, service_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pod_map (
        id VARCHAR(36) PRIMARY KEY,
        az_name VARCHAR(255),
        dc_name VARCHAR(255),
        pod_name VARCHAR(255) NOT NULL,
        pod_az_name VARCHAR(255),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ,
        CONSTRAINT pod_map0az_name0pod_name UNIQUE (az_name, pod_name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pod_binding (
        id VARCHAR(36) PRIMARY KEY,
        tenant_id VARCHAR(36) NOT NULL,
        az_pod_map_id VARCHAR(36) NOT NULL REFERENCES pod_map (id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ,
        CONSTRAINT pod_binding0tenant_id0az_pod_map_id UNIQUE (tenant_id, az_pod_map_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cascaded_sites_resource_routing (
        id SERIAL PRIMARY KEY,
        top_id VARCHAR(36) NOT NULL,
        bottom_id VARCHAR(36),
        site_id VARCHAR(64) NOT NULL REFERENCES cascaded_sites (site_id),
        project_id VARCHAR(36),
        resource_type VARCHAR(64) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ,
        CONSTRAINT cascaded_sites_resource_routing0top_id0site_id UNIQUE (top_id, site_id)
    )
    "#,
];

/// Tables created by `STATEMENTS`, in dependency order
pub const TABLES: &[&str] = &[
    "aggregates",
    "aggregate_metadata",
    "instance_types",
    "instance_type_projects",
    "instance_type_extra_specs",
    "key_pairs",
    "quotas",
    "quality_of_service_specs",
    "volume_types",
    "cascaded_sites",
    "cascaded_site_service_configuration",
    "pod_map",
    "pod_binding",
    "cascaded_sites_resource_routing",
];
