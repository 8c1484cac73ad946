use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 表格列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    /// 分类
    Categoria,
    /// 子分类
    Subcategoria,
    /// 图片来源（URL 或空）
    Fotos,
    /// 价格
    Precio,
    /// 货币
    Moneda,
    /// 标题
    Titulo,
    /// 描述
    Descripcion,
    /// 省份
    Provincia,
    /// 市镇
    Municipio,
    /// 电话
    Telefono,
    /// 邮箱
    Email,
    /// 发布状态（S = 已发布）
    Publicado,
    /// 发布后的链接
    Link,
}

impl Column {
    /// 所有必需列，按表格标准顺序
    pub const REQUIRED: [Column; 13] = [
        Column::Categoria,
        Column::Subcategoria,
        Column::Fotos,
        Column::Precio,
        Column::Moneda,
        Column::Titulo,
        Column::Descripcion,
        Column::Provincia,
        Column::Municipio,
        Column::Telefono,
        Column::Email,
        Column::Publicado,
        Column::Link,
    ];

    /// 获取标准表头
    pub fn header(self) -> &'static str {
        match self {
            Column::Categoria => "Categoria",
            Column::Subcategoria => "Subcategoria",
            Column::Fotos => "Fotos",
            Column::Precio => "Precio",
            Column::Moneda => "Moneda",
            Column::Titulo => "Titulo",
            Column::Descripcion => "Descripcion",
            Column::Provincia => "Provincia",
            Column::Municipio => "Municipio",
            Column::Telefono => "Telefono",
            Column::Email => "Email",
            Column::Publicado => "Publicado",
            Column::Link => "Link",
        }
    }

    /// 从表头解析列（先经过别名表归一化）
    pub fn from_header(header: &str) -> Option<Self> {
        let canonical = canonical_header(header);
        Column::REQUIRED
            .iter()
            .copied()
            .find(|c| c.header() == canonical)
    }
}

/// 旧版表格使用的小写或带重音的表头
static HEADER_ALIASES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "categoria" => "Categoria",
    "categoría" => "Categoria",
    "subcategoria" => "Subcategoria",
    "subcategoría" => "Subcategoria",
    "fotos" => "Fotos",
    "foto" => "Fotos",
    "imagen" => "Fotos",
    "imagen1" => "Fotos",
    "precio" => "Precio",
    "moneda" => "Moneda",
    "titulo" => "Titulo",
    "título" => "Titulo",
    "descripcion" => "Descripcion",
    "descripción" => "Descripcion",
    "provincia" => "Provincia",
    "municipio" => "Municipio",
    "telefono" => "Telefono",
    "teléfono" => "Telefono",
    "email" => "Email",
    "correo" => "Email",
    "publicado" => "Publicado",
    "link" => "Link",
    "enlace" => "Link",
};

/// 表头归一化：去空白，已知别名映射为标准表头，未知列原样保留
pub fn canonical_header(raw: &str) -> String {
    let trimmed = raw.trim();
    HEADER_ALIASES
        .get(trimmed.to_lowercase().as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// 发布状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishStatus {
    Pending,
    Published,
}

impl PublishStatus {
    /// 表格中 "S" 表示已发布，其它任何值都视为待发布
    pub fn from_cell(cell: &str) -> Self {
        if cell.trim().eq_ignore_ascii_case("S") {
            PublishStatus::Published
        } else {
            PublishStatus::Pending
        }
    }

    pub fn as_cell(self) -> &'static str {
        match self {
            PublishStatus::Pending => "N",
            PublishStatus::Published => "S",
        }
    }
}

/// 一条广告记录（表格中的一行）
///
/// 身份就是行号 `row_id`，从 0 开始，不含表头。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdRecord {
    pub row_id: usize,
    pub categoria: String,
    pub subcategoria: String,
    pub fotos: String,
    pub precio: String,
    pub moneda: String,
    pub titulo: String,
    pub descripcion: String,
    pub provincia: String,
    pub municipio: String,
    pub telefono: String,
    pub email: String,
    pub status: PublishStatus,
    pub link: String,
}

impl AdRecord {
    pub fn is_published(&self) -> bool {
        self.status == PublishStatus::Published
    }

    /// 图片 URL（去空白后非空才算）
    pub fn photo_url(&self) -> Option<&str> {
        let url = self.fotos.trim();
        (!url.is_empty()).then_some(url)
    }
}

/// 提交给表单的数据
///
/// `photo` 是已经下载到本地的图片；下载失败时为 `None`，照常发布。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdPayload {
    pub categoria: String,
    pub subcategoria: String,
    pub photo: Option<PathBuf>,
    pub precio: String,
    pub moneda: String,
    pub titulo: String,
    pub descripcion: String,
    pub provincia: String,
    pub municipio: String,
    pub telefono: String,
    pub email: String,
}

impl AdPayload {
    /// 从记录构建（不含图片）
    pub fn from_record(record: &AdRecord) -> Self {
        Self {
            categoria: record.categoria.trim().to_string(),
            subcategoria: record.subcategoria.trim().to_string(),
            photo: None,
            precio: record.precio.trim().to_string(),
            moneda: record.moneda.trim().to_string(),
            titulo: record.titulo.trim().to_string(),
            descripcion: record.descripcion.trim().to_string(),
            provincia: record.provincia.trim().to_string(),
            municipio: record.municipio.trim().to_string(),
            telefono: record.telefono.trim().to_string(),
            email: record.email.trim().to_string(),
        }
    }

    /// 按列取文本值，图片列与状态列没有文本值
    pub fn text(&self, column: Column) -> Option<&str> {
        let value = match column {
            Column::Categoria => &self.categoria,
            Column::Subcategoria => &self.subcategoria,
            Column::Precio => &self.precio,
            Column::Moneda => &self.moneda,
            Column::Titulo => &self.titulo,
            Column::Descripcion => &self.descripcion,
            Column::Provincia => &self.provincia,
            Column::Municipio => &self.municipio,
            Column::Telefono => &self.telefono,
            Column::Email => &self.email,
            Column::Fotos | Column::Publicado | Column::Link => return None,
        };
        (!value.is_empty()).then_some(value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_map_to_canonical_headers() {
        assert_eq!(canonical_header(" titulo "), "Titulo");
        assert_eq!(canonical_header("Título"), "Titulo");
        assert_eq!(canonical_header("DESCRIPCIÓN"), "Descripcion");
        assert_eq!(canonical_header("Notas"), "Notas");
        assert_eq!(Column::from_header("teléfono"), Some(Column::Telefono));
        assert_eq!(Column::from_header("Notas"), None);
    }

    #[test]
    fn test_status_from_cell() {
        assert_eq!(PublishStatus::from_cell("S"), PublishStatus::Published);
        assert_eq!(PublishStatus::from_cell(" s "), PublishStatus::Published);
        assert_eq!(PublishStatus::from_cell("N"), PublishStatus::Pending);
        assert_eq!(PublishStatus::from_cell(""), PublishStatus::Pending);
        assert_eq!(PublishStatus::from_cell("Si"), PublishStatus::Pending);
    }

    #[test]
    fn test_payload_skips_empty_values() {
        let payload = AdPayload {
            titulo: "Bicicleta".to_string(),
            ..Default::default()
        };
        assert_eq!(payload.text(Column::Titulo), Some("Bicicleta"));
        assert_eq!(payload.text(Column::Email), None);
        assert_eq!(payload.text(Column::Fotos), None);
    }
}
