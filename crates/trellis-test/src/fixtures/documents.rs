// Dweve Trellis - Markup Object Graph Compiler
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Well-formed documents.

/// Namespace declarations shared by every fixture root.
pub const ROOT_NAMESPACES: &str = r#"xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml""#;

/// A single button with a converted member and text content.
pub fn button() -> &'static str {
    r#"<Button xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml" Width="120" x:Name="ok">OK</Button>"#
}

/// Panels nested through their read-only child collection.
pub fn nested_panels() -> &'static str {
    r#"<StackPanel xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml">
    <Button Width="10"/>
    <StackPanel>
        <TextBlock>Inner</TextBlock>
    </StackPanel>
    <Button Width="20"/>
</StackPanel>"#
}

/// Text content that needs whitespace normalization.
pub fn text_content() -> &'static str {
    r#"<TextBlock xmlns="urn:trellis:ui">
    Hello
    world
</TextBlock>"#
}

/// An attached property and a property element.
pub fn attached_properties() -> &'static str {
    r#"<Grid xmlns="urn:trellis:ui">
    <Button Grid.Row="1" Column="2">
        <Button.Background>Blue</Button.Background>
    </Button>
</Grid>"#
}

/// A page whose resources are referenced from its content.
pub fn page_with_resources() -> &'static str {
    r#"<Page xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml">
    <Page.Resources>
        <Brush x:Key="Accent">Orange</Brush>
        <Brush x:Key="Muted">Gray</Brush>
        <Style x:Key="Primary" Background="{StaticResource Accent}"/>
    </Page.Resources>
    <Button Background="{StaticResource Accent}" Tag="{StaticResource Primary}"/>
</Page>"#
}

/// A dictionary whose second entry references the first.
pub fn backward_reference() -> &'static str {
    r#"<ResourceDictionary xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml">
    <Brush x:Key="Red">Red</Brush>
    <Rect x:Key="r" Fill="{StaticResource Red}"/>
</ResourceDictionary>"#
}

/// A dictionary whose first entry references a later sibling.
pub fn forward_reference() -> &'static str {
    r#"<ResourceDictionary xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml"><Rect x:Key="r" Fill="{StaticResource Red}"/><Brush x:Key="Red">Red</Brush></ResourceDictionary>"#
}

/// A dictionary entry that references itself.
pub fn self_reference() -> &'static str {
    r#"<ResourceDictionary xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml">
    <Rect x:Key="loop" Tag="{StaticResource loop}"/>
</ResourceDictionary>"#
}

/// A style keyed by its target type.
pub fn implicit_style() -> &'static str {
    r#"<ResourceDictionary xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml">
    <Style TargetType="Button" Background="Green"/>
    <Style x:Key="Explicit" TargetType="TextBlock"/>
</ResourceDictionary>"#
}

/// Custom, null and nested markup extensions.
pub fn extensions() -> &'static str {
    r#"<StackPanel xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml">
    <TextBlock Text="{Binding Path=Title}" Tag="{x:Null}"/>
    <TextBlock Text="{Binding Subtitle, Mode=OneWay}"/>
    <TextBlock Text="{}{literal}"/>
</StackPanel>"#
}

/// Content in a conditional namespace.
pub fn conditional() -> &'static str {
    r#"<StackPanel xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml" xmlns:new="urn:trellis:ui?IsApiPresent(Shiny)">
    <Button Width="1"/>
    <new:Button Width="2"/>
    <Button new:Width="3"/>
</StackPanel>"#
}

/// Content in an ignorable namespace that the registry does not know.
pub fn ignorable() -> &'static str {
    r#"<StackPanel xmlns="urn:trellis:ui" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" xmlns:d="urn:designer" mc:Ignorable="d" d:DesignWidth="640">
    <d:Preview Size="Large"><d:Child/></d:Preview>
    <Button d:Hint="x" Width="5"/>
</StackPanel>"#
}

/// Inline content where whitespace between items is significant.
pub fn inline_whitespace() -> &'static str {
    r#"<Paragraph xmlns="urn:trellis:ui"><Run>Hello</Run> <Run>world</Run><LineBreak/> <Run>again</Run></Paragraph>"#
}

/// Text under `xml:space="preserve"`.
pub fn preserved_space() -> &'static str {
    r#"<TextBlock xmlns="urn:trellis:ui" xml:space="preserve">  two  spaces  </TextBlock>"#
}

/// Dictionary entries that must be built eagerly.
pub fn named_entries() -> &'static str {
    r#"<ResourceDictionary xmlns="urn:trellis:ui" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml">
    <Brush x:Key="Plain">Red</Brush>
    <Rect x:Key="Named" x:Name="theRect"/>
    <Rect x:Key="Runtime" Name="alsoNamed"/>
    <Color x:Key="Palette">Blue</Color>
    <ResourceDictionary x:Key="Nested"/>
</ResourceDictionary>"#
}

/// A dictionary with `count` keyed brushes followed by a rect that uses
/// the first one.
pub fn large_dictionary(count: usize) -> String {
    let mut out = format!("<ResourceDictionary {}>\n", ROOT_NAMESPACES);
    for i in 0..count {
        out.push_str(&format!("    <Brush x:Key=\"b{}\">C{}</Brush>\n", i, i));
    }
    out.push_str("    <Rect x:Key=\"user\" Fill=\"{StaticResource b0}\"/>\n");
    out.push_str("</ResourceDictionary>");
    out
}
