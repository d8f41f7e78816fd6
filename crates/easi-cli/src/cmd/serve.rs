use std::path::Path;

pub fn run(root: &Path, port: u16) -> anyhow::Result<()> {
    // Fail early with a readable error instead of serving an empty project.
    easi_core::config::Config::load(root)?;

    let rt = tokio::runtime::Runtime::new()?;
    let root = root.to_path_buf();
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let actual = listener.local_addr()?.port();
        println!("EASi API: http://localhost:{actual}/api/intakes");

        tokio::select! {
            result = easi_server::serve_on(root, listener) => result,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
