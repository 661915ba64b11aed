//! Control page served for every path that is not an API endpoint.
//!
//! The page polls `/estado` every two seconds and submits the threshold form
//! to `/limites` with a plain GET.

pub const INDEX_HTML: &str = concat!(
    "<!DOCTYPE html><html><head><meta charset='UTF-8'><title>Controle de Nivel</title>",
    "<meta name='viewport' content='width=device-width, initial-scale=1.0'>",
    "<style>",
    "body { font-family: sans-serif; text-align: center; padding: 20px; background: #f0f0f0; }",
    "h1 { color: #333; }",
    ".container { background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); max-width: 400px; margin: auto; }",
    "p { font-size: 18px; } #status { font-weight: bold; }",
    "form { margin-top: 20px; } label { display: block; margin-bottom: 5px; font-weight: bold; }",
    "input[type=number] { width: 90%; padding: 10px; margin-bottom: 15px; border: 1px solid #ccc; border-radius: 4px; }",
    "input[type=submit] { background: #007bff; color: white; padding: 10px 20px; border: none; border-radius: 4px; font-size: 16px; cursor: pointer; }",
    "</style>",
    "<script>",
    "function atualizar() {",
    "  fetch('/estado').then(res => res.json()).then(data => {",
    "    document.getElementById('nivel').innerText = data.nivel + '%';",
    "    document.getElementById('bomba').innerText = data.bomba ? 'LIGADA' : 'Desligada';",
    "    document.getElementById('bomba').style.color = data.bomba ? '#4CAF50' : '#f44336';",
    "  });",
    "}",
    "setInterval(atualizar, 2000);",
    "</script></head><body onload='atualizar()'>",
    "<div class='container'>",
    "<h1>Controle de Nível</h1>",
    "<p>Nível Atual: <span id='nivel'>--</span></p>",
    "<p>Status da Bomba: <span id='bomba'>--</span></p>",
    "<form action='/limites' method='get'>",
    "<label for='min'>Limite Mínimo (%):</label>",
    "<input type='number' id='min' name='min' required>",
    "<label for='max'>Limite Máximo (%):</label>",
    "<input type='number' id='max' name='max' required>",
    "<input type='submit' value='Atualizar Limites'>",
    "</form>",
    "</div></body></html>",
);
