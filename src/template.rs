//! Project scaffolding from a template tree.
//!
//! Files whose name ends in `.tera` are rendered and written without the
//! suffix. Everything else is copied byte for byte, which keeps JSX braces
//! intact.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tera::{Context, Tera};

use crate::error::{LaunchkitError, Result};

const TEMPLATE_SUFFIX: &str = ".tera";
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git"];

/// Values substituted into `.tera` files.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateVars {
    pub project_name: String,
    pub auth_mode: String,
    pub database_provider: String,
    pub deploy_target: String,
    pub package_manager: String,
    /// Exact installed version, pinned as `packageManager` when known.
    pub package_manager_version: Option<String>,
}

impl TemplateVars {
    fn context(&self) -> Result<Context> {
        Ok(Context::from_serialize(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// The Next.js starter compiled into the binary.
    Builtin,
    Directory(PathBuf),
}

impl TemplateSource {
    pub fn from_option(dir: Option<PathBuf>) -> Self {
        dir.map(TemplateSource::Directory)
            .unwrap_or(TemplateSource::Builtin)
    }
}

/// Write the template into `target`, returning the created files relative to it.
pub fn materialize(source: &TemplateSource, target: &Path, vars: &TemplateVars) -> Result<Vec<PathBuf>> {
    ensure_empty_target(target)?;
    let context = vars.context()?;

    let mut written = Vec::new();
    match source {
        TemplateSource::Builtin => {
            for (name, content) in BUILTIN_FILES {
                let rel = write_entry(target, Path::new(name), content.as_bytes(), &context)?;
                written.push(rel);
            }
        }
        TemplateSource::Directory(root) => {
            if !root.is_dir() {
                return Err(LaunchkitError::Scaffold {
                    path: root.clone(),
                    message: "template directory does not exist".to_string(),
                });
            }
            copy_tree(root, root, target, &context, &mut written)?;
        }
    }

    written.sort();
    tracing::info!("Materialized {} files into {}", written.len(), target.display());
    Ok(written)
}

fn ensure_empty_target(target: &Path) -> Result<()> {
    if !target.exists() {
        return Ok(());
    }
    if !target.is_dir() {
        return Err(LaunchkitError::Scaffold {
            path: target.to_path_buf(),
            message: "a file with that name already exists".to_string(),
        });
    }
    if std::fs::read_dir(target)?.next().is_some() {
        return Err(LaunchkitError::Scaffold {
            path: target.to_path_buf(),
            message: "directory is not empty".to_string(),
        });
    }
    Ok(())
}

fn copy_tree(
    root: &Path,
    dir: &Path,
    target: &Path,
    context: &Context,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();

        if entry.file_type()?.is_dir() {
            if SKIPPED_DIRS.iter().any(|s| name == *s) {
                tracing::debug!("Skipping {}", path.display());
                continue;
            }
            copy_tree(root, &path, target, context, written)?;
            continue;
        }

        let rel = path.strip_prefix(root).map_err(|e| anyhow::anyhow!(e))?;
        let bytes = std::fs::read(&path)?;
        written.push(write_entry(target, rel, &bytes, context)?);
    }
    Ok(())
}

/// Write one template entry, rendering it when it carries the template suffix.
fn write_entry(target: &Path, rel: &Path, bytes: &[u8], context: &Context) -> Result<PathBuf> {
    let rel_str = rel.to_string_lossy();
    let (out_rel, content) = match rel_str.strip_suffix(TEMPLATE_SUFFIX) {
        Some(stripped) => {
            let source = std::str::from_utf8(bytes).map_err(|_| LaunchkitError::Scaffold {
                path: rel.to_path_buf(),
                message: "template file is not valid UTF-8".to_string(),
            })?;
            let rendered = Tera::one_off(source, context, false)?;
            (PathBuf::from(stripped), rendered.into_bytes())
        }
        None => (rel.to_path_buf(), bytes.to_vec()),
    };

    let dest = target.join(&out_rel);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&dest, content)?;
    Ok(out_rel)
}

const BUILTIN_FILES: &[(&str, &str)] = &[
    (
        "package.json.tera",
        r#"{
  "name": "{{ project_name }}",
  "version": "0.1.0",
  "private": true,
{%- if package_manager_version %}
  "packageManager": "{{ package_manager }}@{{ package_manager_version }}",
{%- endif %}
  "scripts": {
    "dev": "next dev",
    "build": "next build",
    "start": "next start",
    "lint": "next lint",
    "test:connections": "node scripts/test-connections.mjs"
  },
  "dependencies": {
    "@supabase/ssr": "^0.5.2",
    "@supabase/supabase-js": "^2.47.10",
    "next": "^15.1.0",
    "pg": "^8.13.1",
    "react": "^19.0.0",
    "react-dom": "^19.0.0"
  },
  "devDependencies": {
    "@types/node": "^22.10.2",
    "@types/pg": "^8.11.10",
    "@types/react": "^19.0.2",
    "typescript": "^5.7.2"
  }
}
"#,
    ),
    (
        "README.md.tera",
        r#"# {{ project_name }}

Generated by launchkit.

| Service  | Mode |
|----------|------|
| Auth     | {{ auth_mode }} |
| Database | {{ database_provider }} |
| Deploy   | {{ deploy_target }} |

## Getting started

```sh
{{ package_manager }} install
{{ package_manager }} dev
```

Check connections with `{{ package_manager }} run test:connections`, or run
`launchkit status` for a full report.

Promote to production services with `launchkit connect --auth` and
`launchkit connect --database`.
"#,
    ),
    (
        ".gitignore",
        "node_modules/\n.next/\nout/\n.env*.local\n.env.local.backup-*\n.vercel\n*.tsbuildinfo\nnext-env.d.ts\n",
    ),
    (
        ".env.example",
        "DATABASE_URL=your-database-url\nNEXT_PUBLIC_SUPABASE_URL=your-supabase-url\nNEXT_PUBLIC_SUPABASE_ANON_KEY=your-supabase-anon-key\nNEXT_PUBLIC_SITE_URL=http://localhost:3000\n",
    ),
    (
        "next.config.mjs",
        "/** @type {import('next').NextConfig} */\nconst nextConfig = {};\n\nexport default nextConfig;\n",
    ),
    (
        "tsconfig.json",
        r#"{
  "compilerOptions": {
    "target": "ES2017",
    "lib": ["dom", "dom.iterable", "esnext"],
    "allowJs": true,
    "skipLibCheck": true,
    "strict": true,
    "noEmit": true,
    "esModuleInterop": true,
    "module": "esnext",
    "moduleResolution": "bundler",
    "resolveJsonModule": true,
    "isolatedModules": true,
    "jsx": "preserve",
    "incremental": true,
    "plugins": [{ "name": "next" }],
    "paths": { "@/*": ["./*"] }
  },
  "include": ["next-env.d.ts", "**/*.ts", "**/*.tsx", ".next/types/**/*.ts"],
  "exclude": ["node_modules"]
}
"#,
    ),
    (
        "app/layout.tsx.tera",
        r#"export const metadata = {
  title: "{{ project_name }}",
};

export default function RootLayout({ children }: { children: React.ReactNode }) {
  return (
    <html lang="en">
      <body>{children}</body>
    </html>
  );
}
"#,
    ),
    (
        "app/page.tsx",
        r#"import { createClient } from "@/lib/supabase/server";

export default async function Home() {
  const supabase = await createClient();
  const { data } = await supabase.auth.getUser();

  return (
    <main style={{ padding: 32, fontFamily: "system-ui" }}>
      <h1>It works</h1>
      <p>{data.user ? `Signed in as ${data.user.email}` : "Not signed in"}</p>
    </main>
  );
}
"#,
    ),
    (
        "lib/supabase/server.ts",
        r#"import { createServerClient } from "@supabase/ssr";
import { cookies } from "next/headers";

export async function createClient() {
  const cookieStore = await cookies();
  return createServerClient(
    process.env.NEXT_PUBLIC_SUPABASE_URL!,
    process.env.NEXT_PUBLIC_SUPABASE_ANON_KEY!,
    {
      cookies: {
        getAll: () => cookieStore.getAll(),
        setAll: (list) => {
          try {
            list.forEach(({ name, value, options }) => cookieStore.set(name, value, options));
          } catch {
            // called from a Server Component; middleware refreshes the session
          }
        },
      },
    },
  );
}
"#,
    ),
    (
        "lib/db.ts",
        r#"import { Pool } from "pg";

export function createPool() {
  return new Pool({ connectionString: process.env.DATABASE_URL, max: 5 });
}
"#,
    ),
    (
        "scripts/test-connections.mjs",
        r#"import { readFileSync, existsSync } from "node:fs";
import pg from "pg";

if (existsSync(".env.local")) {
  for (const line of readFileSync(".env.local", "utf8").split("\n")) {
    const m = line.match(/^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*)$/);
    if (m && !(m[1] in process.env)) process.env[m[1]] = m[2].replace(/\s+#.*$/, "");
  }
}

let failed = false;

async function check(name, fn) {
  try {
    await fn();
    console.log(`ok    ${name}`);
  } catch (err) {
    failed = true;
    console.log(`fail  ${name}: ${err.message}`);
  }
}

await check("database", async () => {
  const client = new pg.Client({
    connectionString: process.env.DATABASE_URL,
    connectionTimeoutMillis: 5000,
  });
  await client.connect();
  await client.query("SELECT 1");
  await client.end();
});

await check("auth", async () => {
  const url = process.env.NEXT_PUBLIC_SUPABASE_URL;
  const key = process.env.NEXT_PUBLIC_SUPABASE_ANON_KEY;
  const res = await fetch(`${url.replace(/\/$/, "")}/rest/v1/`, {
    headers: { apikey: key, Authorization: `Bearer ${key}` },
    signal: AbortSignal.timeout(5000),
  });
  if (!res.ok) throw new Error(`HTTP ${res.status}`);
});

process.exit(failed ? 1 : 0);
"#,
    ),
];
