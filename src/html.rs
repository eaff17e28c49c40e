//! The map page. Kept as a `&'static str` template so both the generated
//! static site and the server ship the same markup without filesystem
//! lookups.

use crate::config::MapConfig;
use serde::Serialize;

/// Where the page loads its data from.
#[derive(Debug, Clone, Serialize)]
pub struct PageSources {
    pub manifest: String,
    pub layer_prefix: String,
    pub layer_suffix: String,
    pub control: String,
    /// Endpoint that records selections server-side, if any.
    pub select: Option<String>,
}

impl PageSources {
    /// Relative paths into a directory written by `generate`.
    pub fn static_files() -> Self {
        Self {
            manifest: "layers.json".into(),
            layer_prefix: "layers/".into(),
            layer_suffix: ".geojson".into(),
            control: "control.html".into(),
            select: None,
        }
    }

    pub fn api() -> Self {
        Self {
            manifest: "/api/layers".into(),
            layer_prefix: "/api/layers/".into(),
            layer_suffix: String::new(),
            control: "/api/control".into(),
            select: Some("/api/select".into()),
        }
    }
}

#[derive(Serialize)]
struct PageConfig<'a> {
    map: PageMap<'a>,
    hover_highlight: bool,
    sources: &'a PageSources,
}

#[derive(Serialize)]
struct PageMap<'a> {
    center: [f64; 2],
    zoom: u8,
    tile_url: &'a str,
    attribution: &'a str,
    subdomains: &'a str,
    max_zoom: u8,
    sidebar_id: &'a str,
}

pub fn index_page(map: &MapConfig, hover_highlight: bool, sources: &PageSources) -> String {
    let config = PageConfig {
        map: PageMap {
            center: map.center,
            zoom: map.zoom,
            tile_url: &map.tile_url,
            attribution: &map.attribution,
            subdomains: &map.subdomains,
            max_zoom: map.max_zoom,
            sidebar_id: &map.sidebar_id,
        },
        hover_highlight,
        sources,
    };
    // Serializing plain strings and numbers cannot fail.
    let json = serde_json::to_string(&config)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/");
    INDEX_HTML
        .replace("__SIDEBAR_ID__", &map.sidebar_id)
        .replace("__PAGE_CONFIG__", &json)
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Housing Policy Map</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
  <style>
    html, body { height: 100%; margin: 0; font-family: sans-serif; }
    #__SIDEBAR_ID__ { position: absolute; top: 0; left: 0; bottom: 0; width: 260px; overflow-y: auto; padding: 12px; box-sizing: border-box; background: #fafafa; }
    #map { position: absolute; top: 0; bottom: 0; left: 260px; right: 0; }
    .layer-control fieldset { border: 0; margin: 0 0 12px; padding: 0; }
    .layer-control label { display: block; margin: 4px 0; cursor: pointer; }
    .popup-table td { padding: 2px 6px; vertical-align: top; }
  </style>
</head>
<body>
  <div id="__SIDEBAR_ID__"></div>
  <div id="map"></div>
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <script>
    const CONFIG = __PAGE_CONFIG__;

    const map = L.map("map", { center: CONFIG.map.center, zoom: CONFIG.map.zoom, zoomControl: false });
    L.control.zoom({ position: "bottomright" }).addTo(map);
    L.tileLayer(CONFIG.map.tile_url, {
      attribution: CONFIG.map.attribution,
      subdomains: CONFIG.map.subdomains,
      maxZoom: CONFIG.map.max_zoom,
    }).addTo(map);
    map.on("click", () => map.closePopup());

    const layers = {};

    function buildLayer(data) {
      return L.geoJSON(data, {
        style: (feature) => feature.properties.style,
        onEachFeature: (feature, layer) => {
          layer.on({
            mouseover: (e) => {
              if (CONFIG.hover_highlight) e.target.setStyle({ color: "black", weight: 0 });
            },
            mouseout: (e) => e.target.setStyle(feature.properties.style),
            click: (e) => {
              if (e.originalEvent && e.originalEvent.button !== 0) return;
              e.target.bindPopup(feature.properties.popup).openPopup();
              L.DomEvent.stopPropagation(e);
            },
          });
        },
      });
    }

    function showOnly(attached) {
      for (const [code, layer] of Object.entries(layers)) {
        if (attached.includes(code)) layer.addTo(map);
        else map.removeLayer(layer);
      }
    }

    async function select(code, group) {
      if (CONFIG.sources.select) {
        const response = await fetch(CONFIG.sources.select, {
          method: "POST",
          headers: { "Content-Type": "application/json" },
          body: JSON.stringify({ category: code || null, group: group }),
        });
        if (response.ok) showOnly((await response.json()).attached);
        return;
      }
      const attached = [];
      document.querySelectorAll(".layer-control input:checked").forEach((el) => {
        if (el.value) attached.push(el.value);
      });
      showOnly(attached);
    }

    async function init() {
      const manifest = await (await fetch(CONFIG.sources.manifest)).json();
      await Promise.all(manifest.map(async (info) => {
        const url = CONFIG.sources.layer_prefix + encodeURIComponent(info.code) + CONFIG.sources.layer_suffix;
        layers[info.code] = buildLayer(await (await fetch(url)).json());
      }));
      showOnly(manifest.filter((info) => info.attached).map((info) => info.code));

      const sidebar = document.getElementById(CONFIG.map.sidebar_id);
      sidebar.innerHTML = await (await fetch(CONFIG.sources.control)).text();
      sidebar.querySelectorAll("input[type=radio]").forEach((input) => {
        input.addEventListener("change", () => select(input.value, input.dataset.group));
      });
    }

    window.addEventListener("DOMContentLoaded", init);
  </script>
</body>
</html>
"#;
