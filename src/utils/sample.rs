//! 生成示例广告表格

use std::path::Path;

use tracing::info;

use crate::error::AppResult;
use crate::models::{save_backlog, Backlog, Column};

const SAMPLE_ROWS: [[&str; 13]; 3] = [
    [
        "Tecnología",
        "Celulares",
        "https://example.com/imagenes/iphone13.jpg",
        "850",
        "USD",
        "iPhone 13 Pro Max 256GB",
        "iPhone 13 Pro Max en excelente estado, 256GB de almacenamiento, batería al 95%",
        "La Habana",
        "Playa",
        "53123456",
        "contacto1@email.com",
        "N",
        "",
    ],
    [
        "Tecnología",
        "Computadoras",
        "https://example.com/imagenes/macbook.jpg",
        "1200",
        "USD",
        "MacBook Air M2 2022",
        "MacBook Air con chip M2, 8GB RAM, 256GB SSD, como nuevo",
        "La Habana",
        "Centro Habana",
        "53234567",
        "contacto2@email.com",
        "N",
        "",
    ],
    [
        "Tecnología",
        "Accesorios",
        "",
        "180",
        "USD",
        "AirPods Pro 2da Generación",
        "AirPods Pro 2da generación con cancelación de ruido activa",
        "La Habana",
        "Vedado",
        "53345678",
        "contacto3@email.com",
        "N",
        "",
    ],
];

/// 构建示例积压表
pub fn sample_backlog() -> AppResult<Backlog> {
    let headers = Column::REQUIRED
        .iter()
        .map(|c| c.header().to_string())
        .collect();
    let rows = SAMPLE_ROWS
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();
    Ok(Backlog::new(headers, rows)?)
}

/// 把示例表格写到 `path`
pub fn create_sample(path: &Path) -> AppResult<()> {
    let backlog = sample_backlog()?;
    save_backlog(&backlog, path)?;
    info!("✓ 示例表格已生成: {} ({} 条广告)", path.display(), backlog.len());
    Ok(())
}
